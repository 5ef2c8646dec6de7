use thiserror::Error;

/// Everything that can go wrong while loading a table or answering one
/// chat turn. All variants are recoverable: they are rendered as a
/// user-visible message at the turn boundary and never tear down the
/// session or the loaded table.
#[derive(Debug, Error)]
pub enum AnalystError {
    /// The uploaded file could not be parsed into a table.
    #[error("failed to load table: {0}")]
    Load(String),

    /// The generated snippet matched the denylist and was rejected
    /// before any parsing or execution.
    #[error("blocked unsafe code (matched `{0}`)")]
    BlockedCode(String),

    /// The snippet ran to completion but never bound the `answer`
    /// variable required by the result contract.
    #[error("snippet did not assign the `answer` variable")]
    MissingResult,

    /// The snippet failed to parse against the query grammar or raised
    /// while evaluating; the original message is preserved.
    #[error("snippet execution failed: {0}")]
    Execution(String),

    /// The generative-text call failed (transport, API, or response
    /// shape). Kept out of the success channel so error prose can never
    /// be mistaken for a query snippet.
    #[error("generative service error: {0}")]
    Service(String),
}

impl AnalystError {
    pub fn execution(msg: impl Into<String>) -> Self {
        AnalystError::Execution(msg.into())
    }
}
