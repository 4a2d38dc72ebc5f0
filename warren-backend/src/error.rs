//! Crate-wide error types.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the message-handling core.
///
/// Expected absence (user not found, no intent detected) is `Option`/`bool`
/// at the call site; these variants are genuine faults.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed provider payload.
    #[error("payload parsing failed: {0}")]
    Parsing(String),

    /// Outbound delivery failure.
    #[error("failed to send message: {0}")]
    SendMessage(String),

    /// Webhook registration failure.
    #[error("webhook registration failed: {0}")]
    Webhook(String),

    /// Malformed LLM output from the intent classifier.
    #[error("intent detection failed: {0}")]
    Intent(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("google api error: {0}")]
    GSuite(String),

    /// The channel cannot perform the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}
