//! Ordered materialization of out-of-order chunks.
//!
//! The writer owns the destination file handle, a RAM budget, a reorder
//! buffer keyed by byte offset, a single write worker, and a streaming
//! hash. Downloaders reserve budget through the admission gate before
//! their request starts, then hand fully buffered chunks over the input
//! channel; the worker drains the reorder buffer in strict offset order,
//! hashing exactly the bytes it writes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use strato_verify::Hasher;

use crate::data::{ChunkId, FileChunk, WaitReason};
use crate::error::{Result, TransferError};

/// Per-body retry budget exposed to downloaders.
const MAX_RETRY_PER_DOWNLOAD_BODY: u32 = 5;

/// Hash-and-write granularity inside a single chunk.
const WRITE_SLICE: usize = 1024 * 1024;

/// Upper bound on the input channel, independent of chunk count.
const MAX_CHANNEL_DEPTH: u64 = 1000;

/// Admission gate: bytes reserved for in-flight chunk bodies.
///
/// `reserved` equals the summed length of chunks that have been admitted
/// but not yet written to disk. A chunk larger than the whole budget is
/// admitted only when nothing else is in flight, so a single-chunk
/// fallback transfer cannot deadlock.
pub struct CacheLimiter {
    budget: u64,
    reserved: AtomicU64,
    freed: Notify,
}

impl CacheLimiter {
    pub fn new(budget: u64) -> Self {
        Self {
            budget: budget.max(1),
            reserved: AtomicU64::new(0),
            freed: Notify::new(),
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Acquire)
    }

    /// Try to reserve `bytes`; false when the budget would be exceeded.
    pub fn try_add(&self, bytes: u64) -> bool {
        let mut current = self.reserved.load(Ordering::Acquire);
        loop {
            let fits = current
                .checked_add(bytes)
                .is_some_and(|sum| sum <= self.budget)
                || (bytes >= self.budget && current == 0);
            if !fits {
                return false;
            }
            match self.reserved.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn release(&self, bytes: u64) {
        let mut current = self.reserved.load(Ordering::Acquire);
        loop {
            match self.reserved.compare_exchange_weak(
                current,
                current.saturating_sub(bytes),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.freed.notify_waiters();
    }

    fn freed(&self) -> tokio::sync::futures::Notified<'_> {
        self.freed.notified()
    }
}

/// Pool of chunk-body buffers, recycled between writes.
struct SlicePool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
}

impl SlicePool {
    fn new(max_retained: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            max_retained: max_retained.max(1),
        }
    }

    fn get(&self, len: usize) -> Vec<u8> {
        let mut buffers = match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match buffers.iter().position(|b| b.capacity() >= len) {
            Some(index) => buffers.swap_remove(index),
            None => Vec::with_capacity(len),
        }
    }

    fn put(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut buffers = match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if buffers.len() < self.max_retained {
            buffers.push(buffer);
        }
    }
}

struct WorkerOutcome {
    result: Result<()>,
    digest: Vec<u8>,
}

/// Writer for one destination file.
///
/// Cheap to share: chunk tasks call [`enqueue_chunk`](Self::enqueue_chunk)
/// concurrently, while [`flush`](Self::flush) is the orchestrator's
/// epilogue step that closes the channel and collects the digest.
pub struct ChunkedFileWriter {
    tx: Mutex<Option<mpsc::Sender<FileChunk>>>,
    worker: Mutex<Option<JoinHandle<WorkerOutcome>>>,
    limiter: Arc<CacheLimiter>,
    pool: Arc<SlicePool>,
    cancel: CancellationToken,
    bytes_saved: Arc<AtomicU64>,
}

impl ChunkedFileWriter {
    /// Start the write worker over an already pre-allocated file handle.
    pub fn new<H>(
        file: tokio::fs::File,
        num_chunks: u64,
        chunk_size: u64,
        limiter: Arc<CacheLimiter>,
        cancel: CancellationToken,
        hasher: H,
    ) -> Self
    where
        H: Hasher + 'static,
    {
        let depth = num_chunks.clamp(1, MAX_CHANNEL_DEPTH) as usize;
        let (tx, rx) = mpsc::channel(depth);
        let max_buffers = (limiter.budget() / chunk_size.max(1)).clamp(1, 64) as usize;
        let pool = Arc::new(SlicePool::new(max_buffers));
        let bytes_saved = Arc::new(AtomicU64::new(0));
        let worker = tokio::spawn(write_worker(
            file,
            rx,
            limiter.clone(),
            pool.clone(),
            cancel.clone(),
            hasher,
            bytes_saved.clone(),
        ));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            limiter,
            pool,
            cancel,
            bytes_saved,
        }
    }

    /// Bytes written to the destination so far, for progress reporting.
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_saved.load(Ordering::Acquire)
    }

    /// Per-body retry budget for range transfers.
    pub fn max_retry_per_download_body(&self) -> u32 {
        MAX_RETRY_PER_DOWNLOAD_BODY
    }

    /// Block until the RAM budget admits a chunk of `chunk_size` bytes, or
    /// cancellation fires. On success `chunk_size` bytes stay reserved
    /// until the chunk is written (or its enqueue fails).
    pub async fn wait_to_schedule_chunk(&self, id: &ChunkId, chunk_size: u64) -> Result<()> {
        id.set_wait_reason(WaitReason::RamToSchedule);
        loop {
            // Register for the release notification before checking, so a
            // release landing between the check and the await still wakes us.
            let freed = self.limiter.freed();
            tokio::pin!(freed);
            freed.as_mut().enable();
            if self.limiter.try_add(chunk_size) {
                id.set_wait_reason(WaitReason::Scheduled);
                return Ok(());
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                _ = &mut freed => {}
            }
        }
    }

    /// Read exactly `length` bytes from `body` and post them to the write
    /// worker. On any failure the chunk's reservation is released; on
    /// success it transfers to the worker.
    ///
    /// `retryable` records whether the caller can re-issue the body from
    /// byte zero; it only affects logging here.
    pub async fn enqueue_chunk<S, E>(
        &self,
        id: ChunkId,
        length: u64,
        mut body: S,
        retryable: bool,
    ) -> Result<()>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut buffer = self.pool.get(length as usize);

        let read_result = loop {
            if buffer.len() as u64 == length {
                break Ok(());
            }
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => break Err(TransferError::Cancelled),
                frame = body.next() => frame,
            };
            match frame {
                Some(Ok(frame)) => {
                    if buffer.len() as u64 + frame.len() as u64 > length {
                        break Err(TransferError::Network(format!(
                            "body longer than expected {length} bytes"
                        )));
                    }
                    buffer.extend_from_slice(&frame);
                }
                Some(Err(e)) => break Err(TransferError::Network(e.to_string())),
                None => {
                    break Err(TransferError::Network(format!(
                        "body ended after {} of {length} bytes",
                        buffer.len()
                    )));
                }
            }
        };

        if let Err(e) = read_result {
            tracing::debug!(
                offset = id.offset(),
                retryable,
                error = %e,
                "chunk body read failed"
            );
            self.pool.put(buffer);
            self.limiter.release(length);
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            return Err(e);
        }

        id.set_wait_reason(WaitReason::QueueToWrite);
        let sender = {
            let guard = match self.tx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.clone()
        };
        let Some(sender) = sender else {
            self.limiter.release(length);
            return Err(TransferError::WriterClosed);
        };
        let chunk = FileChunk::new(id, buffer);
        if sender.send(chunk).await.is_err() {
            self.limiter.release(length);
            return Err(TransferError::WriterClosed);
        }
        Ok(())
    }

    /// Close the input channel, wait for the worker to drain, and return
    /// the streaming digest over everything written. Write errors recorded
    /// during the drain surface here.
    pub async fn flush(&self) -> Result<Vec<u8>> {
        {
            let mut guard = match self.tx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take();
        }
        let worker = {
            let mut guard = match self.worker.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        let Some(worker) = worker else {
            return Err(TransferError::WriterClosed);
        };
        let outcome = worker
            .await
            .map_err(|e| TransferError::Network(format!("write worker panicked: {e}")))?;
        outcome.result?;
        Ok(outcome.digest)
    }

    pub fn limiter(&self) -> &CacheLimiter {
        &self.limiter
    }
}

/// The single task allowed to touch the file, the reorder buffer, and the
/// hasher.
async fn write_worker<H>(
    mut file: tokio::fs::File,
    mut rx: mpsc::Receiver<FileChunk>,
    limiter: Arc<CacheLimiter>,
    pool: Arc<SlicePool>,
    cancel: CancellationToken,
    mut hasher: H,
    bytes_saved: Arc<AtomicU64>,
) -> WorkerOutcome
where
    H: Hasher + 'static,
{
    let mut next_offset: u64 = 0;
    let mut bytes_written: u64 = 0;
    let mut reorder: BTreeMap<u64, FileChunk> = BTreeMap::new();
    let mut failure: Option<TransferError> = None;

    while let Some(chunk) = rx.recv().await {
        if cancel.is_cancelled() && failure.is_none() {
            failure = Some(TransferError::Cancelled);
        }
        reorder.insert(chunk.id.offset(), chunk);

        // Drain everything that is now contiguous with the write cursor.
        while let Some(chunk) = reorder.remove(&next_offset) {
            let FileChunk { id, body } = chunk;
            let length = body.len() as u64;
            if failure.is_none() {
                id.set_wait_reason(WaitReason::DiskIo);
                for slice in body.chunks(WRITE_SLICE) {
                    hasher.update(slice);
                    if let Err(e) = file.write_all(slice).await {
                        tracing::error!(offset = id.offset(), error = %e, "chunk write failed");
                        failure = Some(e.into());
                        break;
                    }
                    bytes_written += slice.len() as u64;
                    bytes_saved.store(bytes_written, Ordering::Release);
                }
                id.set_wait_reason(WaitReason::Done);
            }
            // Reservation and buffer return even when the write was
            // skipped, so producers blocked on the gate make progress.
            limiter.release(length);
            pool.put(body);
            next_offset += length;
        }
    }

    // Channel closed. Whatever is still buffered can never become
    // contiguous; release it so the limiter ends balanced.
    for (_, chunk) in std::mem::take(&mut reorder) {
        let length = chunk.body.len() as u64;
        limiter.release(length);
        pool.put(chunk.body);
    }

    if failure.is_none() {
        if let Err(e) = file.flush().await {
            failure = Some(e.into());
        }
    }
    tracing::debug!(bytes_written, "write worker drained");

    WorkerOutcome {
        result: match failure {
            Some(e) => Err(e),
            None => Ok(()),
        },
        digest: hasher.finalize(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use strato_verify::Md5Hasher;
    use tempfile::tempdir;

    fn body_of(data: &[u8]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin + Send {
        let frames: Vec<Result<Bytes, std::io::Error>> = data
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(frames)
    }

    fn chunk_id(offset: u64, length: u64) -> ChunkId {
        ChunkId::new(Arc::new(PathBuf::from("/tmp/dest")), offset, length)
    }

    async fn writer_over(
        dir: &tempfile::TempDir,
        size: u64,
        num_chunks: u64,
        chunk_size: u64,
        budget: u64,
    ) -> (ChunkedFileWriter, PathBuf) {
        let path = dir.path().join("out.bin");
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.set_len(size).unwrap();
        let writer = ChunkedFileWriter::new(
            tokio::fs::File::from_std(file),
            num_chunks,
            chunk_size,
            Arc::new(CacheLimiter::new(budget)),
            CancellationToken::new(),
            Md5Hasher::new(),
        );
        (writer, path)
    }

    #[tokio::test]
    async fn test_out_of_order_chunks_write_in_order() {
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let (writer, path) = writer_over(&dir, 5000, 5, 1024, 1 << 20).await;

        // Enqueue in scrambled order; every chunk was admitted first.
        for offset in [4096u64, 0, 2048, 3072, 1024] {
            let length = (5000 - offset).min(1024);
            let id = chunk_id(offset, length);
            writer.wait_to_schedule_chunk(&id, length).await.unwrap();
            writer
                .enqueue_chunk(
                    id,
                    length,
                    body_of(&data[offset as usize..(offset + length) as usize]),
                    true,
                )
                .await
                .unwrap();
        }

        let digest = writer.flush().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), data);
        assert_eq!(digest, Md5Hasher::digest(&data));
        assert_eq!(writer.limiter().reserved(), 0);
    }

    #[tokio::test]
    async fn test_short_body_releases_reservation() {
        let dir = tempdir().unwrap();
        let (writer, _path) = writer_over(&dir, 1024, 1, 1024, 1 << 20).await;

        let id = chunk_id(0, 1024);
        writer.wait_to_schedule_chunk(&id, 1024).await.unwrap();
        let err = writer
            .enqueue_chunk(id, 1024, body_of(&[0u8; 100]), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("100"));
        assert_eq!(writer.limiter().reserved(), 0);

        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let dir = tempdir().unwrap();
        let (writer, _path) = writer_over(&dir, 64, 1, 64, 1 << 20).await;

        let id = chunk_id(0, 64);
        writer.wait_to_schedule_chunk(&id, 64).await.unwrap();
        let err = writer
            .enqueue_chunk(id, 64, body_of(&[1u8; 128]), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("longer than expected"));
        assert_eq!(writer.limiter().reserved(), 0);
        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_chunk_still_drains() {
        let dir = tempdir().unwrap();
        let data = vec![9u8; 1024];
        let (writer, _path) = writer_over(&dir, 2048, 2, 1024, 1 << 20).await;

        // Only the second chunk ever arrives; the worker must not wedge.
        let id = chunk_id(1024, 1024);
        writer.wait_to_schedule_chunk(&id, 1024).await.unwrap();
        writer
            .enqueue_chunk(id, 1024, body_of(&data), true)
            .await
            .unwrap();

        writer.flush().await.unwrap();
        assert_eq!(writer.limiter().reserved(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_gate_blocks_until_release() {
        let dir = tempdir().unwrap();
        // Budget fits exactly one chunk.
        let (writer, _path) = writer_over(&dir, 2048, 2, 1024, 1024).await;
        let writer = Arc::new(writer);

        let first = chunk_id(0, 1024);
        writer.wait_to_schedule_chunk(&first, 1024).await.unwrap();
        assert_eq!(writer.limiter().reserved(), 1024);

        // A second admission must stall until the first chunk is written.
        let blocked = {
            let writer = writer.clone();
            tokio::spawn(async move {
                let second = chunk_id(1024, 1024);
                writer.wait_to_schedule_chunk(&second, 1024).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        writer
            .enqueue_chunk(first, 1024, body_of(&[3u8; 1024]), true)
            .await
            .unwrap();
        blocked.await.unwrap().unwrap();
        assert_eq!(writer.limiter().reserved(), 1024);
    }

    #[tokio::test]
    async fn test_enqueue_after_flush_fails() {
        let dir = tempdir().unwrap();
        let (writer, _path) = writer_over(&dir, 64, 1, 64, 1 << 20).await;
        writer.flush().await.unwrap();

        let id = chunk_id(0, 64);
        let err = writer
            .enqueue_chunk(id, 64, body_of(&[0u8; 64]), true)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::WriterClosed));
    }

    #[test]
    fn test_cache_limiter_relaxed_admission() {
        let limiter = CacheLimiter::new(100);
        // An oversized chunk is admitted only into an empty limiter.
        assert!(limiter.try_add(500));
        assert!(!limiter.try_add(1));
        limiter.release(500);
        assert!(limiter.try_add(60));
        assert!(!limiter.try_add(500));
        assert!(limiter.try_add(40));
        assert!(!limiter.try_add(1));
    }
}
