/// Shared error type used across all Reloom crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("transport {transport}: {message}")]
    Transport { transport: String, message: String },

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("step {step_id} not found in thread {thread_id}")]
    StepNotFound { thread_id: String, step_id: String },

    #[error("config: {0}")]
    Config(String),

    /// The turn was superseded by a newer submission. Not a failure.
    #[error("turn cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
