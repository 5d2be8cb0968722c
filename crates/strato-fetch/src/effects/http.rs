use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use http::{HeaderMap, StatusCode};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status line, headers, and streaming body of a GET response.
///
/// The status is surfaced rather than turned into an error so callers can
/// apply their own retry classification.
pub struct HttpResponse<E> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes, E>>,
}

/// Asynchronous HTTP client abstraction.
///
/// The minimal interface the engine needs: a metadata fetch and a streaming
/// GET, both with caller-supplied headers. Implementations handle their own
/// redirect following, timeout configuration, and connection pooling, and
/// must NOT treat non-2xx statuses as errors — the engine inspects them.
///
/// # Implementations
///
/// - [`ReqwestClient`]: production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for transport-level failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a HEAD request and return the status and response headers.
    fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<(StatusCode, HeaderMap), Self::Error>> + Send;

    /// Issue a GET request and return the response with a streaming body.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use futures_util::StreamExt;

    use super::*;
    use crate::error::TransferError;

    /// Idle connections kept per host for range-request reuse.
    const MAX_IDLE_PER_HOST: usize = 100;

    /// How long an idle pooled connection survives.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Redirect chain limit; beyond this the request fails.
    const MAX_REDIRECTS: usize = 10;

    /// Production HTTP client implementation using reqwest.
    ///
    /// Compression stays disabled (the corresponding cargo features are not
    /// enabled) so response byte counts match `Content-Length` exactly.
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Build a client with the given per-operation deadline.
        pub fn new(operation_deadline: Duration) -> Result<Self, TransferError> {
            let client = reqwest::Client::builder()
                .timeout(operation_deadline)
                .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
                .pool_idle_timeout(IDLE_TIMEOUT)
                .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
                .build()
                .map_err(|e| TransferError::Network(e.to_string()))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn head(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<(StatusCode, HeaderMap), Self::Error> {
            let mut request = self.client.head(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request.send().await?;
            Ok((response.status(), response.headers().clone()))
        }

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<HttpResponse<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request.send().await?;
            let status = response.status();
            let response_headers = response.headers().clone();
            let body: BoxStream<'static, Result<Bytes, Self::Error>> =
                response.bytes_stream().boxed();
            Ok(HttpResponse {
                status,
                headers: response_headers,
                body,
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
