//! Unified error types for Wikiflow.

use thiserror::Error;

/// Result type alias using WikiflowError.
pub type Result<T> = std::result::Result<T, WikiflowError>;

#[derive(Error, Debug)]
pub enum WikiflowError {
    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Workflow definition errors
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    // Delivery errors
    #[error("Mail transport error: {0}")]
    Mail(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl WikiflowError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn invalid_workflow(msg: impl Into<String>) -> Self {
        Self::InvalidWorkflow(msg.into())
    }

    pub fn mail(msg: impl Into<String>) -> Self {
        Self::Mail(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
