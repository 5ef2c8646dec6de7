use dotenv::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub open_ai_key: String,
    pub open_ai_model: String,
    pub server_port: u16,
    pub preview_rows: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            open_ai_key: env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set"),
            open_ai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a valid port number"),
            preview_rows: env::var("PREVIEW_ROWS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("PREVIEW_ROWS must be a positive integer"),
        }
    }
}
