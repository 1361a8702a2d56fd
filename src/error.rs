use thiserror::Error;

/// Errors the analysis engine can produce.
///
/// Nothing here is fatal: parse failures settle as a recoverable status,
/// transport failures drive the channel state machine, and stale replies are
/// not errors at all (they are silently discarded).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Something went wrong encoding or decoding a JSON frame.
    #[error("JSON error: {0}")]
    Json(String),

    /// The analysis channel is not open. Surfaced through the status
    /// projection until the next reconnect.
    #[error("analysis channel unavailable")]
    ChannelUnavailable,

    /// An analysis request saw no reply within its window.
    #[error("analysis request {0} timed out after {1} ms")]
    Timeout(u64, u64),

    /// Transport-level websocket failure.
    #[error("websocket error: {0}")]
    Ws(String),

    /// The document collaborator could not be reached or answered garbage.
    #[error("document fetch failed: {0}")]
    Document(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> EngineError {
        EngineError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> EngineError {
        EngineError::Document(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EngineError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> EngineError {
        EngineError::Ws(err.to_string())
    }
}
