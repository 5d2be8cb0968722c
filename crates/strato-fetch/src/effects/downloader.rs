//! Range-request execution for generic HTTP sources.
//!
//! One downloader exists per transfer. Its prologue re-probes the resource
//! and pins the capabilities every chunk relies on (range support, entity
//! tag, expected hash); each chunk task then issues a single ranged GET
//! with bounded retry and hands the paced body to the writer.

use std::future::Future;
use std::sync::Arc;

use http::StatusCode;

use crate::core::retry::retry_delay;
use crate::data::{ChunkId, Location, TransferStatus, WaitReason};
use crate::effects::http::HttpClient;
use crate::effects::pacer::{PacedStream, TokenBucketPacer};
use crate::effects::probe::Prober;
use crate::effects::state::TransferState;
use crate::effects::writer::ChunkedFileWriter;
use crate::error::TransferError;

/// Downloader implementation selected by source location.
///
/// The location set is closed, so dispatch is a tagged variant rather than
/// open-world polymorphism. Only the generic-HTTP variant lives in this
/// crate; cloud-specific variants belong with their SDK integrations.
#[derive(Debug)]
pub enum SourceDownloader<C: HttpClient> {
    Http(HttpDownloader<C>),
}

/// Select the downloader for `location` at transfer construction time.
pub fn downloader_for<C: HttpClient + 'static>(
    location: Location,
    client: Arc<C>,
    url: impl Into<String>,
    bearer_token: Option<String>,
    custom_headers: Vec<(String, String)>,
) -> Result<SourceDownloader<C>, TransferError> {
    match location {
        Location::Http => Ok(SourceDownloader::Http(HttpDownloader::new(
            client,
            url,
            bearer_token,
            custom_headers,
        ))),
        other => Err(TransferError::UnsupportedLocation(other)),
    }
}

#[derive(Debug)]
pub struct HttpDownloader<C: HttpClient> {
    client: Arc<C>,
    url: String,
    bearer_token: Option<String>,
    custom_headers: Vec<(String, String)>,

    // Pinned by the prologue probe.
    supports_range: bool,
    content_length: u64,
    expected_hash: Option<Vec<u8>>,
    etag: Option<String>,
}

impl<C: HttpClient + 'static> HttpDownloader<C> {
    pub fn new(
        client: Arc<C>,
        url: impl Into<String>,
        bearer_token: Option<String>,
        custom_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            bearer_token,
            custom_headers,
            supports_range: false,
            content_length: 0,
            expected_hash: None,
            etag: None,
        }
    }

    /// Re-probe the resource on behalf of the transfer and validate that
    /// its size still matches what enumeration saw. Marks the transfer
    /// failed on probe failure or divergence.
    pub async fn prologue(
        &mut self,
        expected_size: u64,
        state: &TransferState,
    ) -> Result<(), TransferError> {
        let prober = Prober::new(self.client.clone());
        let descriptor = match prober
            .probe(
                &self.url,
                self.bearer_token.as_deref(),
                &self.custom_headers,
                state.cancel_token(),
            )
            .await
        {
            Ok(descriptor) => descriptor,
            Err(crate::error::ProbeError::Cancelled) => {
                state.mark_cancelled();
                return Err(TransferError::Cancelled);
            }
            Err(e) => {
                let error = TransferError::from(e);
                tracing::warn!(url = %self.url, error = %error, "prologue probe failed");
                state.mark(TransferStatus::Failed);
                return Err(error);
            }
        };

        if descriptor.size > 0 && descriptor.size != expected_size {
            state.mark(TransferStatus::Failed);
            return Err(TransferError::LengthMismatch {
                expected: expected_size,
                actual: descriptor.size,
            });
        }

        self.supports_range = descriptor.supports_range;
        self.content_length = descriptor.size;
        self.expected_hash = descriptor.content_hash;
        self.etag = descriptor.etag;
        Ok(())
    }

    /// Nothing to tear down: the HTTP client owns its connection pool.
    pub fn epilogue(&self) {}

    pub fn supports_range(&self) -> bool {
        self.supports_range
    }

    /// Size observed by the prologue probe (0 when the server declared none).
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Whole-resource hash the server declared at prologue time, if any.
    pub fn expected_content_hash(&self) -> Option<&[u8]> {
        self.expected_hash.as_deref()
    }

    fn chunk_headers(&self, id: &ChunkId, length: u64) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.custom_headers.len() + 3);
        if self.supports_range {
            headers.push((
                "Range".to_string(),
                format!("bytes={}-{}", id.offset(), id.offset() + length - 1),
            ));
        }
        if let Some(token) = &self.bearer_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if let Some(etag) = &self.etag {
            headers.push(("If-Match".to_string(), etag.clone()));
        }
        headers.extend_from_slice(&self.custom_headers);
        headers
    }

    /// Build the task that fetches one chunk and enqueues it to the writer.
    ///
    /// The task owns everything it needs and reports its outcome through
    /// `state`; completion is counted in every exit path so the epilogue
    /// can account for all scheduled chunks.
    pub fn chunk_task(
        &self,
        state: Arc<TransferState>,
        writer: Arc<ChunkedFileWriter>,
        id: ChunkId,
        length: u64,
        pacer: Arc<TokenBucketPacer>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let client = self.client.clone();
        let url = self.url.clone();
        let headers = self.chunk_headers(&id, length);
        let supports_range = self.supports_range;

        async move {
            let _accounted = ChunkDoneGuard { state: &state };

            if !supports_range && id.offset() > 0 {
                state.fail_active_download(
                    "Range request validation",
                    TransferError::RangeUnsupported(id.offset()),
                );
                return;
            }

            let cancel = state.cancel_token().clone();
            let retry_budget = writer.max_retry_per_download_body();
            let mut attempt: u32 = 0;

            let response = loop {
                id.set_wait_reason(WaitReason::HeaderResponse);
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => {
                        state.mark_cancelled();
                        return;
                    }
                    outcome = client.get(&url, &headers) => outcome,
                };

                let (retryable, error) = match outcome {
                    Ok(response)
                        if response.status == StatusCode::OK
                            || response.status == StatusCode::PARTIAL_CONTENT =>
                    {
                        break response;
                    }
                    Ok(response) if response.status == StatusCode::PRECONDITION_FAILED => {
                        // The resource changed under us; prior chunks may
                        // belong to a different version of it.
                        state.fail_active_download(
                            "Downloading response body",
                            TransferError::EntityTagMismatch { url: url.clone() },
                        );
                        return;
                    }
                    Ok(response) => {
                        let status = response.status.as_u16();
                        (
                            response.status.is_server_error()
                                || response.status == StatusCode::TOO_MANY_REQUESTS,
                            TransferError::Download {
                                operation: "Downloading response body",
                                url: url.clone(),
                                reason: format!("unexpected status code: {status}"),
                            },
                        )
                    }
                    Err(e) => (
                        true,
                        TransferError::Download {
                            operation: "Downloading response body",
                            url: url.clone(),
                            reason: e.to_string(),
                        },
                    ),
                };

                if !retryable || attempt >= retry_budget {
                    state.fail_active_download("Downloading response body", error);
                    return;
                }
                tracing::warn!(
                    url = %url,
                    offset = id.offset(),
                    attempt = attempt + 1,
                    max_attempts = retry_budget + 1,
                    error = %error,
                    "retrying chunk request"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        state.mark_cancelled();
                        return;
                    }
                    _ = tokio::time::sleep(retry_delay(attempt)) => {}
                }
                attempt += 1;
            };

            id.set_wait_reason(WaitReason::Body);
            let paced = PacedStream::new(response.body, pacer, cancel.clone());
            if let Err(e) = writer.enqueue_chunk(id, length, paced, true).await {
                match e {
                    TransferError::Cancelled => state.mark_cancelled(),
                    other => state.fail_active_download("Enqueuing chunk", other),
                }
            }
        }
    }
}

/// Counts the chunk as done on every exit path, including panics.
struct ChunkDoneGuard<'a> {
    state: &'a TransferState,
}

impl Drop for ChunkDoneGuard<'_> {
    fn drop(&mut self) {
        self.state.report_chunk_done();
    }
}
