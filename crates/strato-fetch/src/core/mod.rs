//! Pure transformations: no I/O, no shared state.

pub mod classify;
pub mod headers;
pub mod retry;
pub mod segment;

pub use classify::{classify, infer_location};
pub use headers::file_name_from_path;
pub use retry::{retry_delay, MAX_RETRY_DELAY};
pub use segment::{chunk_count, plan_chunks, ChunkSpan};
