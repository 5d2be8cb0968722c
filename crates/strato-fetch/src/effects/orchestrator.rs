//! Drives a single transfer from a probed descriptor to a local file.
//!
//! The orchestrator never blocks on individual chunk completion — only on
//! the writer's admission gate while scheduling. Its epilogue joins every
//! scheduled chunk, drains the writer, validates the content hash, and
//! renames the staged file into place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use strato_fs::StagedFile;
use strato_verify::Md5Hasher;

use crate::core::segment::plan_chunks;
use crate::data::{
    ChunkId, HashValidationPolicy, Progress, ResourceDescriptor, TransferOptions, TransferPhase,
    TransferStatus,
};
use crate::effects::downloader::HttpDownloader;
use crate::effects::http::HttpClient;
use crate::effects::pacer::TokenBucketPacer;
use crate::effects::pool::WorkerPool;
use crate::effects::state::TransferState;
use crate::effects::writer::{CacheLimiter, ChunkedFileWriter};
use crate::error::{Result, TransferError};

/// Outcome of a completed transfer.
#[derive(Debug)]
pub struct TransferSummary {
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub chunks: u64,
    /// Streaming digest over the written bytes; `None` for the zero-size
    /// fast path, which writes nothing.
    pub digest: Option<Vec<u8>>,
}

/// Per-transfer driver wiring the downloader, writer, pool, and pacer
/// together.
///
/// The pool and pacer are injected so several transfers of one job can
/// share them; the orchestrator owns nothing long-lived itself.
pub struct TransferOrchestrator<C: HttpClient + 'static> {
    client: Arc<C>,
    pool: Arc<WorkerPool>,
    pacer: Arc<TokenBucketPacer>,
    options: TransferOptions,
}

impl<C: HttpClient + 'static> TransferOrchestrator<C> {
    pub fn new(
        client: Arc<C>,
        pool: Arc<WorkerPool>,
        pacer: Arc<TokenBucketPacer>,
        options: TransferOptions,
    ) -> Self {
        Self {
            client,
            pool,
            pacer,
            options,
        }
    }

    /// Run one transfer to completion.
    ///
    /// Returns the summary on success; on failure or cancellation the temp
    /// file is removed, the destination is untouched, and the first error
    /// encountered is returned. The shared `state` reflects the terminal
    /// status either way.
    pub async fn run(
        &self,
        descriptor: &ResourceDescriptor,
        source_url: &str,
        destination: &Path,
        state: Arc<TransferState>,
    ) -> Result<TransferSummary> {
        let outcome = self
            .run_inner(descriptor, source_url, destination, &state)
            .await;
        if let Err(e) = &outcome {
            // Terminal status always lands, whichever path errored out.
            if matches!(e, TransferError::Cancelled) {
                state.mark_cancelled();
            } else {
                state.mark(TransferStatus::Failed);
            }
        }
        outcome
    }

    async fn run_inner(
        &self,
        descriptor: &ResourceDescriptor,
        source_url: &str,
        destination: &Path,
        state: &Arc<TransferState>,
    ) -> Result<TransferSummary> {
        state.mark(TransferStatus::InProgress);
        self.emit(state, TransferPhase::Probing, descriptor.size, 0);

        // Zero-size resources skip scheduling entirely.
        if descriptor.size == 0 {
            tokio::fs::File::create(destination).await?;
            state.mark(TransferStatus::Completed);
            self.emit(state, TransferPhase::Completed, 0, 0);
            return Ok(TransferSummary {
                destination: destination.to_path_buf(),
                bytes_written: 0,
                chunks: 0,
                digest: None,
            });
        }

        // Fail fast before any disk or network work when the policy demands
        // a hash the server did not declare.
        if self.options.hash_policy == HashValidationPolicy::FailIfDifferentOrMissing
            && descriptor.content_hash.is_none()
        {
            state.mark(TransferStatus::Failed);
            return Err(TransferError::HashMissing);
        }

        let total_size = descriptor.size;
        let staged = StagedFile::create(destination, &self.options.job_id, total_size)
            .map_err(TransferError::from)?;

        let bearer = self
            .options
            .bearer_token
            .clone()
            .or_else(|| descriptor.bearer_token.clone());
        let mut downloader = HttpDownloader::new(
            self.client.clone(),
            source_url,
            bearer,
            self.options.headers.to_vec(),
        );
        downloader.prologue(total_size, state).await?;

        // Servers without range support get exactly one whole-file chunk.
        let chunk_size = if !downloader.supports_range() && total_size > self.options.chunk_size {
            tracing::debug!(url = source_url, "no range support, falling back to single chunk");
            total_size
        } else {
            self.options.chunk_size
        };

        let spans = plan_chunks(total_size, chunk_size);
        let num_chunks = spans.len() as u64;
        state.set_chunks_total(num_chunks);

        let limiter = Arc::new(CacheLimiter::new(self.options.ram_budget));
        let file = tokio::fs::File::from_std(staged.open().map_err(TransferError::from)?);
        let writer = Arc::new(ChunkedFileWriter::new(
            file,
            num_chunks,
            chunk_size,
            limiter,
            state.cancel_token().clone(),
            Md5Hasher::new(),
        ));

        let destination_name = Arc::new(staged.temp_path().to_path_buf());
        let mut tasks = JoinSet::new();
        for span in &spans {
            let id = ChunkId::new(destination_name.clone(), span.offset, span.length);
            match writer.wait_to_schedule_chunk(&id, span.length).await {
                Ok(()) => {}
                Err(TransferError::Cancelled) => {
                    state.mark_cancelled();
                    break;
                }
                Err(e) => {
                    state.fail_active_download("Scheduling chunk", e);
                    break;
                }
            }
            let task = downloader.chunk_task(
                state.clone(),
                writer.clone(),
                id,
                span.length,
                self.pacer.clone(),
            );
            self.pool.spawn(&mut tasks, task);
            state.report_chunk_scheduled();
            self.emit(state, TransferPhase::Downloading, total_size, writer.bytes_saved());
        }

        // Epilogue: every scheduled chunk reports, then the writer drains.
        while tasks.join_next().await.is_some() {}
        let flush_result = writer.flush().await;
        downloader.epilogue();
        self.emit(state, TransferPhase::Finalizing, total_size, writer.bytes_saved());

        let digest = match flush_result {
            Ok(digest) => digest,
            Err(e) => {
                state.mark(TransferStatus::Failed);
                return Err(e);
            }
        };

        if state.status() == TransferStatus::Cancelled {
            return Err(TransferError::Cancelled);
        }
        if let Some(failure) = state.take_failure() {
            return Err(failure);
        }

        let expected = downloader
            .expected_content_hash()
            .or(descriptor.content_hash.as_deref());
        self.check_content_hash(&digest, expected, state)?;

        staged.commit().map_err(TransferError::from)?;
        state.mark(TransferStatus::Completed);
        self.emit(state, TransferPhase::Completed, total_size, writer.bytes_saved());
        tracing::info!(
            url = source_url,
            destination = %destination.display(),
            bytes = total_size,
            chunks = num_chunks,
            "transfer complete"
        );

        Ok(TransferSummary {
            destination: destination.to_path_buf(),
            bytes_written: total_size,
            chunks: num_chunks,
            digest: Some(digest),
        })
    }

    fn check_content_hash(
        &self,
        digest: &[u8],
        expected: Option<&[u8]>,
        state: &TransferState,
    ) -> Result<()> {
        match (self.options.hash_policy, expected) {
            (HashValidationPolicy::None, _) => Ok(()),
            (_, Some(expected)) => match strato_verify::verify(digest, expected) {
                Ok(()) => Ok(()),
                Err(e) => {
                    if self.options.hash_policy == HashValidationPolicy::LogOnly {
                        tracing::warn!(error = %e, "content hash mismatch (accepted by policy)");
                        Ok(())
                    } else {
                        state.mark(TransferStatus::Failed);
                        Err(TransferError::HashMismatch {
                            expected: hex::encode(expected),
                            actual: hex::encode(digest),
                        })
                    }
                }
            },
            (HashValidationPolicy::FailIfDifferentOrMissing, None) => {
                state.mark(TransferStatus::Failed);
                Err(TransferError::HashMissing)
            }
            (_, None) => Ok(()),
        }
    }

    fn emit(
        &self,
        state: &TransferState,
        phase: TransferPhase,
        total_bytes: u64,
        bytes_written: u64,
    ) {
        if let Some(callback) = &self.options.on_progress {
            callback(&Progress {
                phase,
                chunks_scheduled: state.chunks_scheduled(),
                chunks_completed: state.chunks_done(),
                chunks_total: state.chunks_total(),
                bytes_written,
                total_bytes,
            });
        }
    }
}
