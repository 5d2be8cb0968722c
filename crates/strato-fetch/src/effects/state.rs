use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::data::{StatusCell, TransferStatus};
use crate::error::TransferError;

/// Shared per-transfer accounting.
///
/// Chunk tasks report completion and failure here; the orchestrator holds
/// the only strong interest in the outcome. The first failure wins — later
/// ones are logged and dropped, because all scheduled chunks run to
/// termination regardless so the writer can drain.
pub struct TransferState {
    url: String,
    status: StatusCell,
    failure: Mutex<Option<TransferError>>,
    chunks_total: AtomicU64,
    chunks_scheduled: AtomicU64,
    chunks_done: AtomicU64,
    cancel: CancellationToken,
}

impl TransferState {
    pub fn new(url: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            url: url.into(),
            status: StatusCell::new(),
            failure: Mutex::new(None),
            chunks_total: AtomicU64::new(0),
            chunks_scheduled: AtomicU64::new(0),
            chunks_done: AtomicU64::new(0),
            cancel,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> TransferStatus {
        self.status.get()
    }

    pub fn mark(&self, status: TransferStatus) -> bool {
        self.status.set(status)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record a chunk-level failure and move the transfer to `Failed`.
    ///
    /// Does not cancel the remaining chunks: they run to termination so the
    /// write worker can drain and release reservations.
    pub fn fail_active_download(&self, operation: &'static str, error: TransferError) {
        tracing::warn!(
            url = %self.url,
            operation,
            error = %error,
            "chunk failed"
        );
        self.status.set(TransferStatus::Failed);
        let mut guard = match self.failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            *guard = Some(error);
        }
    }

    /// Move the transfer to `Cancelled` (sticky like every terminal state).
    pub fn mark_cancelled(&self) {
        self.status.set(TransferStatus::Cancelled);
    }

    pub fn take_failure(&self) -> Option<TransferError> {
        match self.failure.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn set_chunks_total(&self, total: u64) {
        self.chunks_total.store(total, Ordering::Release);
    }

    pub fn chunks_total(&self) -> u64 {
        self.chunks_total.load(Ordering::Acquire)
    }

    pub fn report_chunk_scheduled(&self) -> u64 {
        self.chunks_scheduled.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn chunks_scheduled(&self) -> u64 {
        self.chunks_scheduled.load(Ordering::Acquire)
    }

    pub fn report_chunk_done(&self) -> u64 {
        self.chunks_done.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn chunks_done(&self) -> u64 {
        self.chunks_done.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_wins() {
        let state = TransferState::new("http://example.com/f", CancellationToken::new());
        state.fail_active_download(
            "Downloading response body",
            TransferError::Network("first".into()),
        );
        state.fail_active_download(
            "Downloading response body",
            TransferError::Network("second".into()),
        );
        assert_eq!(state.status(), TransferStatus::Failed);
        let failure = state.take_failure().unwrap();
        assert!(failure.to_string().contains("first"));
        assert!(state.take_failure().is_none());
    }

    #[test]
    fn test_cancel_does_not_override_failure() {
        let state = TransferState::new("http://example.com/f", CancellationToken::new());
        state.fail_active_download("Enqueuing chunk", TransferError::Network("x".into()));
        state.mark_cancelled();
        assert_eq!(state.status(), TransferStatus::Failed);
    }

    #[test]
    fn test_chunk_accounting() {
        let state = TransferState::new("http://example.com/f", CancellationToken::new());
        state.set_chunks_total(3);
        assert_eq!(state.report_chunk_scheduled(), 1);
        assert_eq!(state.report_chunk_done(), 1);
        assert_eq!(state.report_chunk_done(), 2);
        assert_eq!(state.chunks_total(), 3);
        assert_eq!(state.chunks_done(), 2);
    }
}
