use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::progress::Progress;

/// What to do with the server-declared content hash at transfer completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashValidationPolicy {
    /// Skip the comparison entirely.
    None,
    /// Compare and log a mismatch, but accept the file.
    LogOnly,
    /// Fail the transfer on mismatch; a server that declares no hash passes.
    #[default]
    FailIfDifferent,
    /// Fail on mismatch and also when the server declared no hash.
    FailIfDifferentOrMissing,
}

/// Configuration for a single transfer.
///
/// # Examples
///
/// ```
/// use strato_fetch::TransferOptions;
///
/// let options = TransferOptions::default()
///     .chunk_size(4 * 1024 * 1024)
///     .workers(64)
///     .bearer_token("token");
/// ```
#[derive(Clone)]
pub struct TransferOptions {
    /// Fixed chunk length in bytes; the last chunk may be shorter.
    ///
    /// Default: 8 MiB
    pub chunk_size: u64,

    /// Number of concurrent chunk workers.
    ///
    /// Default: 32
    pub workers: usize,

    /// RAM budget for buffered-but-unwritten chunk bodies, enforced by the
    /// writer's admission gate.
    ///
    /// Default: 512 MiB
    pub ram_budget: u64,

    /// Throughput cap in megabits per second; 0 disables pacing.
    ///
    /// Default: 0
    pub throughput_cap_mbps: u64,

    /// Content-hash validation policy applied at the epilogue.
    pub hash_policy: HashValidationPolicy,

    /// Bearer token sent as `Authorization: Bearer <token>` on the probe
    /// and every chunk request.
    pub bearer_token: Option<String>,

    /// Custom headers sent with every request, including retries.
    pub headers: Arc<[(String, String)]>,

    /// Per-operation deadline for chunk requests.
    ///
    /// Default: 30 minutes
    pub operation_deadline: Duration,

    /// Identifier woven into the temp-file name so concurrent jobs never
    /// collide on the same destination.
    pub job_id: String,

    /// Progress callback invoked on phase transitions and chunk completion.
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("chunk_size", &self.chunk_size)
            .field("workers", &self.workers)
            .field("ram_budget", &self.ram_budget)
            .field("throughput_cap_mbps", &self.throughput_cap_mbps)
            .field("hash_policy", &self.hash_policy)
            .field("bearer_token", &self.bearer_token.as_deref().map(|_| "***"))
            .field("headers", &self.headers)
            .field("operation_deadline", &self.operation_deadline)
            .field("job_id", &self.job_id)
            .field("on_progress", &"{ ... }")
            .finish()
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8 * 1024 * 1024,
            workers: 32,
            ram_budget: 512 * 1024 * 1024,
            throughput_cap_mbps: 0,
            hash_policy: HashValidationPolicy::default(),
            bearer_token: None,
            headers: Arc::new([]),
            operation_deadline: Duration::from_secs(30 * 60),
            job_id: uuid::Uuid::new_v4().to_string(),
            on_progress: None,
        }
    }
}

impl TransferOptions {
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn ram_budget(mut self, ram_budget: u64) -> Self {
        self.ram_budget = ram_budget.max(1);
        self
    }

    #[must_use]
    pub fn throughput_cap_mbps(mut self, mbps: u64) -> Self {
        self.throughput_cap_mbps = mbps;
        self
    }

    #[must_use]
    pub fn hash_policy(mut self, policy: HashValidationPolicy) -> Self {
        self.hash_policy = policy;
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Add a single custom HTTP header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    #[must_use]
    pub fn operation_deadline(mut self, deadline: Duration) -> Self {
        self.operation_deadline = deadline;
        self
    }

    #[must_use]
    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}
