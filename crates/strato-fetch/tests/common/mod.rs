//! Shared mock HTTP client for integration tests.
//!
//! Serves a configurable byte buffer the way a real endpoint would:
//! optional bearer-token enforcement, range support, `Content-MD5`
//! advertisement, entity tags with `If-Match` checking, and injected
//! error statuses.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use futures_util::StreamExt;
use http::{HeaderMap, HeaderValue, StatusCode};

use strato_fetch::{BoxStream, HttpClient, HttpResponse};
use strato_verify::Md5Hasher;

/// Frame size used when streaming bodies, small enough that chunks span
/// several frames.
const FRAME: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub require_auth: bool,
    pub valid_token: String,
    pub support_ranges: bool,
    pub return_md5: bool,
    /// Advertise an MD5 that does not match the data.
    pub wrong_md5: bool,
    pub etag: Option<String>,
    /// Every request answers with this status.
    pub error_status: Option<u16>,
    /// GET requests answer with this status; HEAD stays healthy.
    pub get_error_status: Option<u16>,
    /// GETs carrying `If-Match` fail with 412 once this many have
    /// succeeded, simulating a resource that changed mid-transfer.
    pub fail_if_match_after: Option<u32>,
    /// Artificial latency per GET.
    pub get_delay: Option<Duration>,
}

#[derive(Debug)]
pub struct MockError(pub String);

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MockError {}

#[derive(Debug)]
pub struct MockHttpClient {
    data: Vec<u8>,
    opts: ServerOptions,
    pub head_count: AtomicU32,
    pub get_count: AtomicU32,
    pub saw_range_header: AtomicBool,
    pub saw_authorization: AtomicBool,
}

impl MockHttpClient {
    pub fn new(data: Vec<u8>, opts: ServerOptions) -> Self {
        Self {
            data,
            opts,
            head_count: AtomicU32::new(0),
            get_count: AtomicU32::new(0),
            saw_range_header: AtomicBool::new(false),
            saw_authorization: AtomicBool::new(false),
        }
    }

    fn authorized(&self, headers: &[(String, String)]) -> bool {
        if !self.opts.require_auth {
            return true;
        }
        let expected = format!("Bearer {}", self.opts.valid_token);
        headers
            .iter()
            .any(|(name, value)| name.eq_ignore_ascii_case("authorization") && *value == expected)
    }

    fn metadata_headers(&self, body_len: usize) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            http::header::CONTENT_LENGTH,
            HeaderValue::from_str(&body_len.to_string()).unwrap(),
        );
        map.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        map.insert(
            http::header::LAST_MODIFIED,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        if self.opts.support_ranges {
            map.insert(http::header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }
        if self.opts.return_md5 {
            let digest = if self.opts.wrong_md5 {
                Md5Hasher::digest(b"not the real content")
            } else {
                Md5Hasher::digest(&self.data)
            };
            let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
            map.insert(
                http::header::HeaderName::from_static("content-md5"),
                HeaderValue::from_str(&encoded).unwrap(),
            );
        }
        if let Some(etag) = &self.opts.etag {
            map.insert(http::header::ETAG, HeaderValue::from_str(etag).unwrap());
        }
        map
    }

    fn parse_range(headers: &[(String, String)]) -> Option<(u64, u64)> {
        let value = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("range"))
            .map(|(_, value)| value.as_str())?;
        let spec = value.strip_prefix("bytes=")?;
        let (start, end) = spec.split_once('-')?;
        Some((start.parse().ok()?, end.parse().ok()?))
    }

    fn body_stream(data: Vec<u8>) -> BoxStream<'static, Result<Bytes, MockError>> {
        let frames: Vec<Result<Bytes, MockError>> = data
            .chunks(FRAME)
            .map(|frame| Ok(Bytes::copy_from_slice(frame)))
            .collect();
        futures_util::stream::iter(frames).boxed()
    }
}

impl HttpClient for MockHttpClient {
    type Error = MockError;

    async fn head(
        &self,
        _url: &str,
        headers: &[(String, String)],
    ) -> Result<(StatusCode, HeaderMap), MockError> {
        self.head_count.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.opts.error_status {
            return Ok((StatusCode::from_u16(status).unwrap(), HeaderMap::new()));
        }
        if !self.authorized(headers) {
            return Ok((StatusCode::UNAUTHORIZED, HeaderMap::new()));
        }
        Ok((StatusCode::OK, self.metadata_headers(self.data.len())))
    }

    async fn get(
        &self,
        _url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse<MockError>, MockError> {
        let sequence = self.get_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.opts.get_delay {
            tokio::time::sleep(delay).await;
        }
        if headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        {
            self.saw_authorization.store(true, Ordering::SeqCst);
        }

        let empty = |status: StatusCode| HttpResponse {
            status,
            headers: HeaderMap::new(),
            body: Self::body_stream(Vec::new()),
        };

        if let Some(status) = self.opts.error_status.or(self.opts.get_error_status) {
            return Ok(empty(StatusCode::from_u16(status).unwrap()));
        }
        if !self.authorized(headers) {
            return Ok(empty(StatusCode::UNAUTHORIZED));
        }

        let carries_if_match = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("if-match"));
        if carries_if_match {
            if let Some(limit) = self.opts.fail_if_match_after {
                if sequence >= limit {
                    return Ok(empty(StatusCode::PRECONDITION_FAILED));
                }
            }
        }

        let range = Self::parse_range(headers);
        if range.is_some() {
            self.saw_range_header.store(true, Ordering::SeqCst);
        }

        match range {
            Some((start, end)) if self.opts.support_ranges => {
                if start >= self.data.len() as u64 {
                    return Ok(empty(StatusCode::RANGE_NOT_SATISFIABLE));
                }
                let end = end.min(self.data.len() as u64 - 1);
                let slice = self.data[start as usize..=end as usize].to_vec();
                let mut response_headers = self.metadata_headers(slice.len());
                response_headers.insert(
                    http::header::CONTENT_RANGE,
                    HeaderValue::from_str(&format!(
                        "bytes {start}-{end}/{}",
                        self.data.len()
                    ))
                    .unwrap(),
                );
                Ok(HttpResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    headers: response_headers,
                    body: Self::body_stream(slice),
                })
            }
            _ => Ok(HttpResponse {
                status: StatusCode::OK,
                headers: self.metadata_headers(self.data.len()),
                body: Self::body_stream(self.data.clone()),
            }),
        }
    }
}

/// Deterministic payload that makes byte-order mistakes visible.
pub fn patterned_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
