mod config;
mod errors;
mod handlers;
mod models;
mod services;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use config::Config;
use handlers::{chat, chat_history, get_insights, get_profile, health, upload_dataset};
use services::ai::OpenAiService;
use services::SessionService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting AI Data Analyst API");

    // Missing credentials are fatal here, not per request.
    let config = Config::from_env();

    let ai_service = OpenAiService::new(&config);
    let session = SessionService::new(ai_service, config.preview_rows);

    let server_url = format!("http://127.0.0.1:{}", config.server_port);
    log::info!("🌐 Starting server at {}", server_url);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(session.clone()))
            .service(
                web::resource("/upload")
                    .route(web::post().to(upload_dataset::<OpenAiService>)),
            )
            .service(
                web::resource("/profile").route(web::get().to(get_profile::<OpenAiService>)),
            )
            .service(web::resource("/chat").route(web::post().to(chat::<OpenAiService>)))
            .service(
                web::resource("/chat/history")
                    .route(web::get().to(chat_history::<OpenAiService>)),
            )
            .service(
                web::resource("/insights").route(web::post().to(get_insights::<OpenAiService>)),
            )
            .service(web::resource("/health").route(web::get().to(health)))
    })
    .bind(format!("127.0.0.1:{}", config.server_port))
    .map_err(|e| {
        log::error!("❌ Failed to bind to port {}: {}", config.server_port, e);
        e
    })?
    .run()
    .await
}
