pub mod ai;
pub mod chart;
pub mod loader;
pub mod narrator;
pub mod profiler;
pub mod query_engine;
pub mod query_parser;
pub mod sandbox;
pub mod session;

use crate::errors::AnalystError;

/// Boundary to the external text-generation service. One operation; a
/// failed call is a tagged error, never error prose in the success
/// channel, so downstream code cannot feed an error message into the
/// snippet sandbox.
#[async_trait::async_trait]
pub trait GenerativeService: Send + Sync + 'static {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, AnalystError>;
}

pub use session::SessionService;
