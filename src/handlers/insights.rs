use actix_web::{web, Error, HttpResponse};

use crate::errors::AnalystError;
use crate::models::response::ErrorResponse;
use crate::services::{GenerativeService, SessionService};

/// Profile and chart choice for the current dataset.
pub async fn get_profile<G>(session: web::Data<SessionService<G>>) -> Result<HttpResponse, Error>
where
    G: GenerativeService,
{
    match session.profile() {
        Ok(Some(profile)) => Ok(HttpResponse::Ok().json(profile)),
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

/// Executive briefing generated from the current profile.
pub async fn get_insights<G>(session: web::Data<SessionService<G>>) -> Result<HttpResponse, Error>
where
    G: GenerativeService,
{
    match session.insights().await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e @ AnalystError::Load(_)) => Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
            status_code: 400,
        })),
        Err(e @ AnalystError::Service(_)) => {
            Ok(HttpResponse::BadGateway().json(ErrorResponse {
                error: e.to_string(),
                status_code: 502,
            }))
        }
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
            status_code: 500,
        })),
    }
}

/// Liveness check.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
