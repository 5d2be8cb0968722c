//! I/O operations with trait abstraction.

pub mod downloader;
pub mod http;
pub mod orchestrator;
pub mod pacer;
pub mod pool;
pub mod probe;
pub mod state;
pub mod writer;

pub use downloader::{downloader_for, HttpDownloader, SourceDownloader};
pub use http::{BoxStream, HttpClient, HttpResponse};
pub use orchestrator::{TransferOrchestrator, TransferSummary};
pub use pacer::{PacedStream, TokenBucketPacer};
pub use pool::WorkerPool;
pub use probe::{ObjectFilter, Prober};
pub use state::TransferState;
pub use writer::{CacheLimiter, ChunkedFileWriter};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
