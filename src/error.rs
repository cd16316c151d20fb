//! Error types shared by the formatters and the directory backends.
//!
//! Rendering never surfaces these to the host: a failed lookup degrades to an
//! empty suggestion list and a malformed token degrades to literal text.
//! They only escape from construction and configuration loading.

use std::path::PathBuf;

/// A failure reported by a [`Directory`](crate::directory::Directory) backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The backend rejected or failed the request.
    #[error("directory request failed ({code}): {message}")]
    Request { code: String, message: String },
    /// No user is logged in, so the directory cannot be queried.
    #[error("no user is logged in")]
    NotLoggedIn,
    /// The backend is not reachable right now.
    #[error("directory backend is unavailable")]
    Unavailable,
}

/// Errors raised while building or configuring a formatter.
#[derive(Debug, thiserror::Error)]
pub enum FormatterError {
    #[error("invalid mention pattern for trigger {trigger:?}: {source}")]
    InvalidPattern {
        trigger: char,
        #[source]
        source: regex::Error,
    },
    /// Triggers must be a single visible, non-whitespace character.
    #[error("invalid trigger character {0:?}")]
    InvalidTrigger(char),
    #[error("failed to read config file {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
