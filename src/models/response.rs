use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::Profile;
use crate::models::session::ChatTurn;

/// Declarative chart recommendation for an external renderer. Picking
/// one is deterministic (see `services::chart`); rendering is out of
/// scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Scatter { x: String, y: String, title: String },
    Histogram { column: String, title: String },
    Bar { category: String, title: String },
}

/// Response for the upload endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub file_name: String,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    /// First rows of the table, as JSON records.
    pub preview: serde_json::Value,
}

/// Request body for the chat endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Response for one chat turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Business-facing answer (or a user-visible error message).
    pub reply: String,
    /// The generated query snippet, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Result rows as JSON records, or a literal scalar value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Response for the chat-history endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub file_name: String,
    pub turns: Vec<ChatTurn>,
}

/// Response for the profile endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub file_name: String,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
}

/// Response for the executive-insights endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsightsResponse {
    pub file_name: String,
    pub insights: String,
}

/// Error response for the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}
