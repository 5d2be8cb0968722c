use std::time::Duration;

/// Ceiling on the backoff between chunk retries.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (0-indexed) of a chunk request.
///
/// Linear backoff: `(attempt + 1)` seconds, capped at [`MAX_RETRY_DELAY`].
/// Chunk retries are frequent and cheap to re-issue, so the ramp is linear
/// rather than exponential.
pub fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt) + 1).min(MAX_RETRY_DELAY)
}
