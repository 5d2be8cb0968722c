//! Error types for the download engine.
//!
//! Errors are grouped by the stage that produces them: classification,
//! URL decomposition, probing, and the transfer itself. Status codes are
//! preserved as numeric substrings in the rendered messages so callers
//! (and their tests) can match on them.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid --location value specified: {0}")]
    InvalidOverride(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("URL cannot be empty")]
    Empty,

    #[error("invalid HTTP URL: {0}")]
    Malformed(String),

    #[error("expected http or https, got: {0}")]
    UnexpectedScheme(String),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("HEAD request failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HEAD request returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("HEAD request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to process enumerated resource: {0}")]
    Process(String),

    #[error("probe cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum TransferError {
    /// A chunk-level operation failed; `operation` names the step the way
    /// the engine logs it ("Downloading response body", "Enqueuing chunk").
    #[error("{operation} failed for {url}: {reason}")]
    Download {
        operation: &'static str,
        url: String,
        reason: String,
    },

    #[error("content length mismatch: enumerated={expected}, actual={actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("server does not support range requests, cannot download chunk at offset {0}")]
    RangeUnsupported(u64),

    #[error("no downloader implemented for location {0}")]
    UnsupportedLocation(crate::data::Location),

    #[error("resource changed during transfer: If-Match rejected with status 412 for {url}")]
    EntityTagMismatch { url: String },

    #[error("checking content hash failed: server did not declare a content hash")]
    HashMissing,

    #[error("checking content hash failed: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Stage(#[from] strato_fs::Error),

    #[error("destination write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk writer is closed")]
    WriterClosed,

    #[error("transfer cancelled")]
    Cancelled,
}

pub type Result<T, E = TransferError> = std::result::Result<T, E>;
