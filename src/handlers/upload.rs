use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse};
use futures::StreamExt;
use std::io::Write;

use crate::errors::AnalystError;
use crate::models::response::ErrorResponse;
use crate::services::{GenerativeService, SessionService};

/// Handle a dataset upload: read the multipart file field, load it into
/// the session table and respond with the profile, chart choice and a
/// short preview. A new upload clears the previous chat history.
pub async fn upload_dataset<G>(
    mut payload: Multipart,
    session: web::Data<SessionService<G>>,
) -> Result<HttpResponse, Error>
where
    G: GenerativeService,
{
    let mut file_content = Vec::new();
    let mut file_name = String::new();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let content_disposition = field.content_disposition();

        if content_disposition.get_name() == Some("file") {
            if let Some(fname) = content_disposition.get_filename() {
                file_name = fname.to_string();
            }

            while let Some(chunk) = field.next().await {
                let data = chunk?;
                file_content.write_all(&data)?;
            }
        }
    }

    if file_content.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "No file uploaded".to_string(),
            status_code: 400,
        }));
    }

    let lower = file_name.to_lowercase();
    if !lower.ends_with(".csv") && !lower.ends_with(".xlsx") {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "File must be a CSV or XLSX".to_string(),
            status_code: 400,
        }));
    }

    match session.upload(&file_name, &file_content) {
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
