use std::time::SystemTime;

/// Everything the capability probe learned about a remote resource.
///
/// `size` is the server-declared length at probe time; a later observation
/// that diverges from it invalidates the transfer.
#[derive(Debug, Clone, Default)]
pub struct ResourceDescriptor {
    /// Last non-empty path segment of the URL, or `downloaded_file`.
    pub name: String,

    /// Server-declared content length; 0 when the header is absent or
    /// unparseable.
    pub size: u64,

    /// Whether the server advertised `Accept-Ranges: bytes`.
    pub supports_range: bool,

    /// Decoded `Content-MD5` header, when present and valid base64.
    pub content_hash: Option<Vec<u8>>,

    /// Raw `ETag` value, kept opaque for `If-Match` echoes.
    pub etag: Option<String>,

    /// Parsed `Last-Modified`, when present and a valid HTTP-date.
    pub last_modified: Option<SystemTime>,

    /// Raw `Content-Type` value.
    pub content_type: Option<String>,

    /// Bearer token the probe was performed with, forwarded to chunk
    /// requests. Opaque; acquisition is the caller's concern.
    pub bearer_token: Option<String>,
}
