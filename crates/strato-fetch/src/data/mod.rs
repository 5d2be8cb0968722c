//! Immutable configuration and types shared across the engine.

pub mod chunk;
pub mod descriptor;
pub mod from_to;
pub mod location;
pub mod options;
pub mod progress;
pub mod status;
pub mod url;

pub use chunk::{ChunkId, FileChunk, WaitReason};
pub use descriptor::ResourceDescriptor;
pub use from_to::FromTo;
pub use location::Location;
pub use options::{HashValidationPolicy, TransferOptions};
pub use progress::{Progress, TransferPhase};
pub use status::{StatusCell, TransferStatus};
pub use url::HttpUrlParts;
