use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to pre-allocate {path} to {size} bytes: {source}")]
    Allocate {
        path: PathBuf,
        size: u64,
        source: std::io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to commit {path}: {source}")]
    Commit {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("destination has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("destination has no file name: {0}")]
    NoFileName(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
