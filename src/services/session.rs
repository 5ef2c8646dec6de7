use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};
use polars::io::json::{JsonFormat, JsonWriter};
use polars::prelude::*;
use serde_json::Value;

use crate::errors::AnalystError;
use crate::models::response::{
    ChatResponse, HistoryResponse, InsightsResponse, ProfileResponse, UploadResponse,
};
use crate::models::session::{Role, SessionState};
use crate::services::sandbox::ExecutionResult;
use crate::services::{chart, loader, narrator, profiler, sandbox, GenerativeService};

const SNIPPET_MAX_TOKENS: u32 = 600;
const SUMMARY_MAX_TOKENS: u32 = 500;
const INSIGHTS_MAX_TOKENS: u32 = 900;

/// Rows of the raw table included in the upload response.
const UPLOAD_PREVIEW_ROWS: usize = 10;

/// Owns the session: the currently loaded table, its profile and chart
/// choice, and the chat history. Uploading a new file swaps the whole
/// state in one critical section, so history can never span two tables.
pub struct SessionService<G>
where
    G: GenerativeService,
{
    ai: Arc<G>,
    state: Arc<Mutex<Option<SessionState>>>,
    generation: Arc<AtomicU64>,
    preview_rows: usize,
}

impl<G> Clone for SessionService<G>
where
    G: GenerativeService,
{
    fn clone(&self) -> Self {
        Self {
            ai: Arc::clone(&self.ai),
            state: Arc::clone(&self.state),
            generation: Arc::clone(&self.generation),
            preview_rows: self.preview_rows,
        }
    }
}

impl<G> SessionService<G>
where
    G: GenerativeService,
{
    pub fn new(ai: G, preview_rows: usize) -> Self {
        Self {
            ai: Arc::new(ai),
            state: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            preview_rows,
        }
    }

    /// Load an uploaded file and make it the session's table. Replaces
    /// any previous table and clears the chat history atomically.
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadResponse, AnalystError> {
        let table = loader::load_table(file_name, bytes)?;
        let profile = profiler::profile(&table);
        let chart = chart::choose_chart(&table);
        let preview = frame_to_json(&table.head(Some(UPLOAD_PREVIEW_ROWS)))?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = SessionState::new(
            generation,
            file_name.to_string(),
            table,
            profile.clone(),
            chart.clone(),
        );
        let session_id = state.id;

        let mut guard = self.state.lock().map_err(lock_err)?;
        *guard = Some(state);
        drop(guard);

        info!(
            "✅ Dataset {} loaded (generation {}), chat history reset",
            file_name, generation
        );
        Ok(UploadResponse {
            session_id,
            file_name: file_name.to_string(),
            profile,
            chart,
            preview,
        })
    }

    pub fn profile(&self) -> Result<Option<ProfileResponse>, AnalystError> {
        let guard = self.state.lock().map_err(lock_err)?;
        Ok(guard.as_ref().map(|state| ProfileResponse {
            file_name: state.file_name.clone(),
            profile: state.profile.clone(),
            chart: state.chart.clone(),
        }))
    }

    pub fn history(&self) -> Result<Option<HistoryResponse>, AnalystError> {
        let guard = self.state.lock().map_err(lock_err)?;
        Ok(guard.as_ref().map(|state| HistoryResponse {
            session_id: state.id,
            file_name: state.file_name.clone(),
            turns: state.history.clone(),
        }))
    }

    /// Answer one chat question. Every per-turn failure is rendered as
    /// an assistant-visible message and recorded; only the absence of a
    /// loaded table is an error to the caller.
    pub async fn chat(&self, message: &str) -> Result<ChatResponse, AnalystError> {
        // Snapshot what the turn needs and record the user turn, without
        // holding the lock across the external calls.
        let (generation, table, profile) = {
            let mut guard = self.state.lock().map_err(lock_err)?;
            let state = guard.as_mut().ok_or_else(no_dataset)?;
            state.add_turn(Role::User, message);
            (state.generation, state.table.clone(), state.profile.clone())
        };

        let (reply, snippet, data) = match self.answer(message, &table, &profile).await {
            Ok((reply, snippet, data)) => (reply, Some(snippet), data),
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                (
                    format!("Sorry - I couldn't compute that safely. ({})", e),
                    None,
                    None,
                )
            }
        };

        self.append_assistant(generation, &reply)?;
        Ok(ChatResponse {
            reply,
            snippet,
            data,
        })
    }

    /// Synthesis, sandboxed execution and narration for one question.
    async fn answer(
        &self,
        message: &str,
        table: &DataFrame,
        profile: &crate::models::profile::Profile,
    ) -> Result<(String, String, Option<Value>), AnalystError> {
        let prompt = narrator::build_snippet_prompt(message, profile);
        let raw = self.ai.generate(&prompt, SNIPPET_MAX_TOKENS).await?;
        let snippet = sandbox::strip_code_fences(&raw);
        info!("Generated snippet: {}", snippet);

        let result = sandbox::run_snippet(table, &snippet)?;
        let preview = narrator::render_preview(&result, self.preview_rows);
        let data = result_to_json(&result)?;

        let summary_prompt = narrator::build_summary_prompt(message, &preview);
        let reply = match self.ai.generate(&summary_prompt, SUMMARY_MAX_TOKENS).await {
            Ok(text) => text,
            Err(e) => {
                error!("Narration failed, falling back to canned reply: {}", e);
                "Here are the results for your query.".to_string()
            }
        };

        Ok((reply, snippet, Some(data)))
    }

    /// Executive briefing over the current profile.
    pub async fn insights(&self) -> Result<InsightsResponse, AnalystError> {
        let (file_name, profile) = {
            let guard = self.state.lock().map_err(lock_err)?;
            let state = guard.as_ref().ok_or_else(no_dataset)?;
            (state.file_name.clone(), state.profile.clone())
        };

        let prompt = narrator::build_insights_prompt(&profile);
        let insights = self.ai.generate(&prompt, INSIGHTS_MAX_TOKENS).await?;
        Ok(InsightsResponse {
            file_name,
            insights,
        })
    }

    /// Append the assistant turn, unless the table was replaced while
    /// the turn was in flight.
    fn append_assistant(&self, generation: u64, reply: &str) -> Result<(), AnalystError> {
        let mut guard = self.state.lock().map_err(lock_err)?;
        match guard.as_mut() {
            Some(state) if state.generation == generation => {
                state.add_turn(Role::Assistant, reply);
            }
            _ => warn!("Dropping assistant reply for a replaced dataset"),
        }
        Ok(())
    }
}

fn no_dataset() -> AnalystError {
    AnalystError::Load("no dataset loaded - upload a CSV or XLSX file first".into())
}

fn lock_err<T>(_: T) -> AnalystError {
    AnalystError::Execution("session state lock poisoned".into())
}

/// Serialize a frame as JSON records, the same way results go out on
/// the wire.
fn frame_to_json(df: &DataFrame) -> Result<Value, AnalystError> {
    let mut buf = Vec::new();
    let mut df_mut = df.clone();
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df_mut)
        .map_err(|e| AnalystError::Execution(format!("failed to serialize result: {}", e)))?;
    let json_string = String::from_utf8(buf)
        .map_err(|e| AnalystError::Execution(format!("result was not valid UTF-8: {}", e)))?;
    serde_json::from_str(&json_string)
        .map_err(|e| AnalystError::Execution(format!("failed to parse result JSON: {}", e)))
}

fn result_to_json(result: &ExecutionResult) -> Result<Value, AnalystError> {
    match result {
        ExecutionResult::Table(df) => frame_to_json(df),
        ExecutionResult::Scalar(value) => Ok(value.to_json()),
    }
}
