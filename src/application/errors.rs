//! Application layer errors

use thiserror::Error;

/// Chat transport errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Cloud document store errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Not registered")]
    NotRegistered,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Bundle error: {0}")]
    Bundle(String),
}

/// Page rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Printing failed: {0}")]
    Print(String),
}

/// Errors producing PDF bytes for an event
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Download failed: {0}")]
    Download(#[from] BotError),

    #[error("Content type mismatch: {0}")]
    ContentMismatch(String),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
