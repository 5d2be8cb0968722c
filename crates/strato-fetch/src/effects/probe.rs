use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::headers;
use crate::data::{HttpUrlParts, ResourceDescriptor};
use crate::effects::http::HttpClient;
use crate::error::ProbeError;

/// Deadline for the capability probe, independent of the much longer
/// per-chunk operation deadline.
const PROBE_DEADLINE: Duration = Duration::from_secs(30);

/// Filter deciding whether an enumerated resource is handed to the
/// processor during [`Prober::traverse`].
pub trait ObjectFilter: Send + Sync {
    fn passes(&self, descriptor: &ResourceDescriptor) -> bool;
}

/// Capability prober: one HEAD request that turns a URL into a
/// [`ResourceDescriptor`].
///
/// Used twice per transfer — once at enumeration and once in the
/// downloader's prologue, whose size must agree with the first.
pub struct Prober<C: HttpClient> {
    client: Arc<C>,
}

impl<C: HttpClient> Prober<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Probe `url` with optional bearer authentication and custom headers.
    ///
    /// Non-2xx statuses fail with the status number preserved in the error
    /// text. Optional metadata headers never fail the probe: a missing or
    /// malformed `Content-Length` yields size 0, an undecodable
    /// `Content-MD5` yields no hash.
    pub async fn probe(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        custom_headers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<ResourceDescriptor, ProbeError> {
        let parts = HttpUrlParts::decompose(url)?;

        let mut request_headers = Vec::with_capacity(custom_headers.len() + 1);
        if let Some(token) = bearer_token {
            request_headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        request_headers.extend_from_slice(custom_headers);

        let head = self.client.head(url, &request_headers);
        let (status, response_headers) = tokio::select! {
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            outcome = tokio::time::timeout(PROBE_DEADLINE, head) => match outcome {
                Err(_) => return Err(ProbeError::Timeout(PROBE_DEADLINE)),
                Ok(Err(e)) => {
                    return Err(ProbeError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
                Ok(Ok(response)) => response,
            },
        };

        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let descriptor = ResourceDescriptor {
            name: headers::file_name_from_path(parts.path()),
            size: headers::content_length(&response_headers),
            supports_range: headers::supports_range(&response_headers),
            content_hash: headers::content_md5(&response_headers),
            etag: headers::entity_tag(&response_headers),
            last_modified: headers::last_modified(&response_headers),
            content_type: headers::content_type(&response_headers),
            bearer_token: bearer_token.map(str::to_string),
        };
        tracing::debug!(
            url,
            name = %descriptor.name,
            size = descriptor.size,
            supports_range = descriptor.supports_range,
            has_hash = descriptor.content_hash.is_some(),
            "probe complete"
        );
        Ok(descriptor)
    }

    /// An HTTP endpoint always names a single file, never a directory.
    pub fn is_directory(&self) -> bool {
        false
    }

    /// Enumerate the single resource behind `url`: probe it, apply the
    /// filters in order, and hand the descriptor to `processor`.
    ///
    /// Returns `Ok(true)` when the processor ran, `Ok(false)` when a
    /// filter skipped the resource.
    pub async fn traverse<F>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        custom_headers: &[(String, String)],
        cancel: &CancellationToken,
        filters: &[Box<dyn ObjectFilter>],
        processor: F,
    ) -> Result<bool, ProbeError>
    where
        F: FnOnce(
            ResourceDescriptor,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    {
        let descriptor = self
            .probe(url, bearer_token, custom_headers, cancel)
            .await?;
        for filter in filters {
            if !filter.passes(&descriptor) {
                tracing::info!(name = %descriptor.name, "skipping resource due to filter");
                return Ok(false);
            }
        }
        processor(descriptor).map_err(|e| ProbeError::Process(e.to_string()))?;
        Ok(true)
    }
}
