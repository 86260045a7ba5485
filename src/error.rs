//! Error types shared by the library.
//!
//! Nothing in the controller core is fatal: these errors only surface from
//! the collaborator edges (settings, statistics, scenario loading) and are
//! logged there rather than propagated into the playback path.

use thiserror::Error;

/// Library errors
#[derive(Error, Debug)]
pub enum AdSkipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("statistics receiver is gone")]
    SinkClosed,

    #[error("no ad strategy for origin: {0}")]
    UnsupportedOrigin(String),

    #[error("invalid scenario: {0}")]
    Scenario(String),
}

pub type Result<T> = std::result::Result<T, AdSkipError>;
