use actix_web::{web, Error, HttpResponse};
use log::info;

use crate::errors::AnalystError;
use crate::models::response::{ChatRequest, ErrorResponse};
use crate::services::{GenerativeService, SessionService};

/// Answer one natural-language question about the loaded dataset. Turn
/// failures come back as a normal reply (and are recorded in history);
/// only the absence of a dataset is an HTTP error.
pub async fn chat<G>(
    request: web::Json<ChatRequest>,
    session: web::Data<SessionService<G>>,
) -> Result<HttpResponse, Error>
where
    G: GenerativeService,
{
    let message = request.message.trim();
    if message.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "Message must not be empty".to_string(),
            status_code: 400,
        }));
    }

    info!("💬 Chat question: {}", message);
    match session.chat(message).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e @ AnalystError::Load(_)) => Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
            status_code: 400,
        })),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
            status_code: 500,
        })),
    }
}

/// Ordered chat turns for the current dataset.
pub async fn chat_history<G>(session: web::Data<SessionService<G>>) -> Result<HttpResponse, Error>
where
    G: GenerativeService,
{
    match session.history() {
        Ok(Some(history)) => Ok(HttpResponse::Ok().json(history)),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: "No dataset loaded".to_string(),
            status_code: 404,
        })),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
            status_code: 500,
        })),
    }
}
