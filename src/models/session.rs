use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::Profile;
use crate::models::response::ChartSpec;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation about the currently loaded table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything the session owns for one uploaded table. Replaced as a
/// whole on every upload, so the chat history can never span two
/// different tables.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    /// Bumped on every upload; turns in flight across an upload check it
    /// before appending to history.
    pub generation: u64,
    pub file_name: String,
    /// The loaded table. Read-only for the lifetime of this state.
    pub table: DataFrame,
    pub profile: Profile,
    pub chart: Option<ChartSpec>,
    pub history: Vec<ChatTurn>,
}

impl SessionState {
    pub fn new(
        generation: u64,
        file_name: String,
        table: DataFrame,
        profile: Profile,
        chart: Option<ChartSpec>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            file_name,
            table,
            profile,
            chart,
            history: Vec::new(),
        }
    }

    pub fn add_turn(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(ChatTurn::new(role, content));
    }
}
