use std::time::Duration;

use log::{error, info};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::AnalystError;
use crate::services::GenerativeService;

/// Client for an OpenAI-style chat-completions endpoint. Holds the
/// credential loaded at startup; a missing key is already fatal in
/// `Config::from_env`, so construction here cannot fail.
#[derive(Clone, Debug)]
pub struct OpenAiService {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiService {
    pub fn new(config: &Config) -> Self {
        info!(
            "AI service initialized (model: {}, key prefix: {}...)",
            config.open_ai_model,
            config.open_ai_key.chars().take(3).collect::<String>()
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: config.open_ai_key.clone(),
            model: config.open_ai_model.clone(),
        }
    }
}

#[async_trait::async_trait]
impl GenerativeService for OpenAiService {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, AnalystError> {
        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a data analysis assistant for business users. Follow the instructions in the user message exactly."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "max_tokens": max_tokens,
            "temperature": 0.2
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach the generation API: {}", e);
                if e.is_timeout() {
                    AnalystError::Service("generation request timed out after 30 seconds".into())
                } else {
                    AnalystError::Service(format!("failed to reach the generation API: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .text()
                .await
                .unwrap_or_else(|_| "could not read error response".to_string());
            error!("Generation API error: status {}, details: {}", status, details);
            return Err(AnalystError::Service(format!(
                "generation API returned status {}",
                status
            )));
        }

        let response_json: Value = response.json().await.map_err(|e| {
            AnalystError::Service(format!("failed to parse generation API response: {}", e))
        })?;

        match response_json["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(content.trim().to_string()),
            None => {
                error!(
                    "Could not extract content from generation response: {:?}",
                    response_json
                );
                Err(AnalystError::Service(
                    "generation response contained no content".into(),
                ))
            }
        }
    }
}
