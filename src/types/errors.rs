use crate::types::Source;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The remote host list needs interactive credentials before it can be fetched.
///
/// Returned as-is from [`crate::Aggregator::load`] so callers can branch into a
/// login flow and retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote authentication required: {reason}")]
pub struct AuthRequired {
    pub reason: String,
}

impl AuthRequired {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to read configuration: {0}")]
    ConfigRead(#[source] StoreError),

    #[error(transparent)]
    AuthRequired(AuthRequired),

    #[error("Failed to persist configuration: {0}")]
    Persistence(#[source] StoreError),

    #[error("Remote source is not enabled or has no base URL")]
    RemoteNotConfigured,

    #[error("Host not found: {0}")]
    HostNotFound(String),

    #[error("Remote error: {0}")]
    Remote(#[source] RemoteError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot determine config directory (no $HOME or $XDG_CONFIG_HOME)")]
    NoConfigDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error(transparent)]
    AuthRequired(#[from] AuthRequired),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),
}

/// One source failed during a load and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnavailable {
    pub source: Source,
    pub reason: String,
}

impl std::fmt::Display for SourceUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} source unavailable: {}", self.source, self.reason)
    }
}
