use std::fmt;

/// Phases of a transfer.
///
/// Transfers progress through these phases in order:
/// Probing → Downloading → Finalizing → Completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    /// Capability probe and size validation in progress.
    #[default]
    Probing,

    /// Chunks are being fetched and written.
    Downloading,

    /// All chunks accounted for; flushing, hash check, rename.
    Finalizing,

    /// Terminal state for successful transfers.
    Completed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferPhase::Probing => "Probing",
            TransferPhase::Downloading => "Downloading",
            TransferPhase::Finalizing => "Finalizing",
            TransferPhase::Completed => "Completed",
        };
        f.write_str(name)
    }
}

/// Snapshot passed to progress callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase: TransferPhase,

    /// Chunks handed to the worker pool so far.
    pub chunks_scheduled: u64,

    /// Chunks that reported completion (success or failure).
    pub chunks_completed: u64,

    /// Total chunks planned for this transfer.
    pub chunks_total: u64,

    /// Bytes the write worker has materialized on disk.
    pub bytes_written: u64,

    /// Expected total bytes from the probe.
    pub total_bytes: u64,
}

impl Progress {
    /// Completion percentage by chunk count, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        if self.chunks_total == 0 {
            return None;
        }
        Some(self.chunks_completed as f64 * 100.0 / self.chunks_total as f64)
    }
}
