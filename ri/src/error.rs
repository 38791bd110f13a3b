//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// A single record that is not a valid event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventFormatError {
    #[error("Unknown event type: {0}")]
    UnknownKind(String),

    #[error("Event of type {kind} is missing required field {field}")]
    MissingField { kind: &'static str, field: &'static str },
}

/// Errors that abort loading a whole event log
///
/// Only an unreadable file ends up here. Malformed records, including a
/// truncated array document, are skipped and counted.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read event log {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
