//! Error types for agentscope-core

use thiserror::Error;

/// Main error type for the agentscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The inference worker thread is gone or refused a message
    #[error("worker error: {0}")]
    Worker(String),

    /// Model load or generation failed inside the pipeline
    #[error("inference error: {0}")]
    Inference(String),

    /// A generation was requested before the model was ready
    #[error("local agent is {status}, model must be ready before running")]
    AgentNotReady { status: String },
}

/// Result type alias for agentscope-core
pub type Result<T> = std::result::Result<T, Error>;
