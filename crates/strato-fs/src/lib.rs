//! Staged-file placement for strato transfers.
//!
//! A download never writes to its destination path directly. It materializes
//! into a hidden temp file next to the destination, and the temp file is
//! atomically renamed into place only after the transfer finishes and its
//! integrity check passes. An unfinished transfer leaves nothing behind:
//! dropping an uncommitted [`StagedFile`] removes the temp file.

pub use self::error::{Error, Result};
pub use self::staged::StagedFile;

mod error;
mod staged;
