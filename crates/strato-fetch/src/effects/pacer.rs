//! Bandwidth pacing for response-body reads.
//!
//! A token-bucket pacer shared by every chunk of a transfer (or a whole
//! job). Wrapping a body stream in [`PacedStream`] makes each yielded frame
//! reserve its byte count from the bucket before the bytes are handed on.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::Instant;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;

/// Refill bookkeeping granularity; elapsed intervals shorter than this are
/// accumulated instead of converted to tokens, so low rates do not starve.
const REFILL_GRANULARITY: Duration = Duration::from_millis(1);

/// Upper bound on a single wait so cancellation is observed promptly.
const MAX_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Token bucket gating body reads to a configured throughput.
///
/// The bucket holds one second of budget, refilled continuously from the
/// configured rate. A rate of zero disables pacing entirely.
pub struct TokenBucketPacer {
    /// Refill rate in bytes per second; 0 means unlimited.
    rate: u64,
    /// Burst capacity, one second of budget.
    capacity: u64,
    tokens: AtomicU64,
    /// Measured on the tokio clock, which may be paused or advanced.
    started: Instant,
    last_refill_us: AtomicU64,
}

impl TokenBucketPacer {
    /// Create a pacer capped at `megabits_per_second`; 0 disables pacing.
    pub fn new(megabits_per_second: u64) -> Self {
        let rate = megabits_per_second * 1_000_000 / 8;
        Self {
            rate,
            capacity: rate.max(1),
            tokens: AtomicU64::new(rate),
            started: Instant::now(),
            last_refill_us: AtomicU64::new(0),
        }
    }

    /// A pacer that never waits.
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.rate > 0
    }

    /// Reserve `bytes` of traffic allocation, waiting for refill as needed.
    ///
    /// Requests larger than the burst capacity are served capacity-sized;
    /// large frames then pay for themselves one bucket at a time upstream.
    pub async fn request_traffic_allocation(
        &self,
        cancel: &CancellationToken,
        bytes: u64,
    ) -> Result<(), TransferError> {
        if self.rate == 0 || bytes == 0 {
            return Ok(());
        }
        let need = bytes.min(self.capacity);
        loop {
            self.refill();
            if self.try_take(need) {
                return Ok(());
            }
            let missing = need.saturating_sub(self.tokens.load(Ordering::Acquire)).max(1);
            let wait = Duration::from_micros(missing.saturating_mul(1_000_000) / self.rate)
                .clamp(REFILL_GRANULARITY, MAX_WAIT_SLICE);
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn refill(&self) {
        let now_us = self.started.elapsed().as_micros() as u64;
        let last_us = self.last_refill_us.load(Ordering::Acquire);
        let elapsed_us = now_us.saturating_sub(last_us);
        if elapsed_us < REFILL_GRANULARITY.as_micros() as u64 {
            return;
        }
        // Claim the interval; a racing refiller that loses adds nothing.
        if self
            .last_refill_us
            .compare_exchange(last_us, now_us, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let add = (self.rate as u128 * elapsed_us as u128 / 1_000_000) as u64;
        if add == 0 {
            return;
        }
        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(add).min(self.capacity);
            match self.tokens.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    fn try_take(&self, need: u64) -> bool {
        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            if current < need {
                return false;
            }
            match self.tokens.compare_exchange_weak(
                current,
                current - need,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

impl fmt::Debug for TokenBucketPacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucketPacer")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("tokens", &self.tokens.load(Ordering::Relaxed))
            .finish()
    }
}

/// A body stream that reserves traffic allocation before yielding each frame.
pub struct PacedStream<S> {
    inner: S,
    pacer: Arc<TokenBucketPacer>,
    cancel: CancellationToken,
    pending: Option<Bytes>,
    acquiring: Option<BoxFuture<'static, Result<(), TransferError>>>,
}

impl<S> PacedStream<S> {
    pub fn new(inner: S, pacer: Arc<TokenBucketPacer>, cancel: CancellationToken) -> Self {
        Self {
            inner,
            pacer,
            cancel,
            pending: None,
            acquiring: None,
        }
    }
}

impl<S, E> Stream for PacedStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<Bytes, TransferError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(fut) = this.acquiring.as_mut() {
                return match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(())) => {
                        this.acquiring = None;
                        Poll::Ready(this.pending.take().map(Ok))
                    }
                    Poll::Ready(Err(e)) => {
                        this.acquiring = None;
                        this.pending = None;
                        Poll::Ready(Some(Err(e)))
                    }
                    Poll::Pending => Poll::Pending,
                };
            }
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    if !this.pacer.is_enabled() {
                        return Poll::Ready(Some(Ok(frame)));
                    }
                    let pacer = this.pacer.clone();
                    let cancel = this.cancel.clone();
                    let len = frame.len() as u64;
                    this.pending = Some(frame);
                    this.acquiring = Some(Box::pin(async move {
                        pacer.request_traffic_allocation(&cancel, len).await
                    }));
                    // Fall through to poll the freshly created future.
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(TransferError::Network(e.to_string()))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
