//! Segmented HTTP downloading with ordered materialization and streaming
//! verification.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and types
//! - [`core`] - Pure transformations
//! - [`effects`] - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **Parallel range fetch**: a known-size resource is split into fixed-size
//!   chunks fetched by a bounded worker pool over concurrent `Range` requests
//! - **Sequential materialization**: completed chunks land in a reorder
//!   buffer and a single write worker drains them to disk in strict byte
//!   order, hashing as it writes
//! - **Bounded memory**: an admission gate reserves RAM for a chunk before
//!   its request starts and releases it the moment its bytes hit the disk
//! - **Consistency**: every chunk carries the probed entity tag as
//!   `If-Match`; a changed resource fails the transfer instead of
//!   producing a stitched file
//! - **Atomic placement**: bytes stream into a `strato-fs` staged file that
//!   is renamed over the destination only after the hash check passes

pub mod core;
pub mod data;
pub mod effects;
pub mod error;

pub use self::core::{classify, plan_chunks, retry_delay, ChunkSpan};
pub use self::data::{
    ChunkId, FromTo, HashValidationPolicy, HttpUrlParts, Location, Progress, ResourceDescriptor,
    TransferOptions, TransferPhase, TransferStatus,
};
pub use self::effects::{
    downloader_for, BoxStream, CacheLimiter, ChunkedFileWriter, HttpClient, HttpDownloader,
    HttpResponse, ObjectFilter, Prober, SourceDownloader, TokenBucketPacer, TransferOrchestrator,
    TransferState, TransferSummary, WorkerPool,
};
pub use self::error::{ClassifyError, ProbeError, TransferError, UrlError};

#[cfg(feature = "reqwest")]
pub use self::effects::ReqwestClient;
