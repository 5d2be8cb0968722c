//! Extraction of probe metadata from HTTP response headers.
//!
//! Parsing is deliberately forgiving: a malformed optional header is
//! treated as absent rather than failing the probe. Only the transport
//! layer escalates malformed framing into errors.

use std::time::SystemTime;

use base64::Engine;
use http::header::{
    HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};

/// Header carrying the whole-resource MD5, base64-encoded.
const CONTENT_MD5: &str = "content-md5";

/// Fallback resource name when the URL path has no usable segment.
pub const DEFAULT_FILE_NAME: &str = "downloaded_file";

/// True when the server advertised byte-range support.
pub fn supports_range(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false)
}

/// Declared content length; 0 when absent or unparseable.
pub fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Decoded `Content-MD5`, or `None` when absent or not valid base64.
pub fn content_md5(headers: &HeaderMap) -> Option<Vec<u8>> {
    let raw = headers.get(CONTENT_MD5)?.to_str().ok()?;
    base64::engine::general_purpose::STANDARD.decode(raw).ok()
}

/// Raw entity tag, kept opaque (including quotes and any weak prefix) so it
/// can be echoed back in `If-Match` verbatim.
pub fn entity_tag(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(ETAG)?.to_str().ok()?;
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Parsed `Last-Modified`, or `None` when absent or not a valid HTTP-date.
pub fn last_modified(headers: &HeaderMap) -> Option<SystemTime> {
    let raw = headers.get(LAST_MODIFIED)?.to_str().ok()?;
    httpdate::parse_http_date(raw).ok()
}

/// Raw `Content-Type`.
pub fn content_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Derive the local file name from a URL path: the last non-empty segment,
/// or [`DEFAULT_FILE_NAME`] when the path has none.
pub fn file_name_from_path(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_supports_range_requires_bytes() {
        assert!(supports_range(&headers(&[("accept-ranges", "bytes")])));
        assert!(!supports_range(&headers(&[("accept-ranges", "none")])));
        assert!(!supports_range(&headers(&[])));
    }

    #[test]
    fn test_content_length_defensive_parse() {
        assert_eq!(content_length(&headers(&[("content-length", "5000")])), 5000);
        assert_eq!(content_length(&headers(&[("content-length", "junk")])), 0);
        assert_eq!(content_length(&headers(&[])), 0);
    }

    #[test]
    fn test_content_md5_decodes_base64() {
        // base64 of the 16-byte MD5 of "abc"
        let encoded = "kAFQmDzST7DWlj99KOF/cg==";
        let decoded = content_md5(&headers(&[("content-md5", encoded)])).unwrap();
        assert_eq!(hex::encode(decoded), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_content_md5_invalid_base64_is_absent() {
        assert_eq!(content_md5(&headers(&[("content-md5", "!!not-base64!!")])), None);
        assert_eq!(content_md5(&headers(&[])), None);
    }

    #[test]
    fn test_entity_tag_is_opaque() {
        assert_eq!(
            entity_tag(&headers(&[("etag", "\"v1\"")])).as_deref(),
            Some("\"v1\"")
        );
        assert_eq!(
            entity_tag(&headers(&[("etag", "W/\"weak\"")])).as_deref(),
            Some("W/\"weak\"")
        );
        assert_eq!(entity_tag(&headers(&[])), None);
    }

    #[test]
    fn test_last_modified_parses_http_date() {
        let parsed = last_modified(&headers(&[(
            "last-modified",
            "Wed, 21 Oct 2015 07:28:00 GMT",
        )]));
        assert!(parsed.is_some());
        assert_eq!(last_modified(&headers(&[("last-modified", "yesterday")])), None);
    }

    #[test]
    fn test_file_name_extraction() {
        assert_eq!(file_name_from_path("/files/data.bin"), "data.bin");
        assert_eq!(file_name_from_path("/files/data.bin/"), "data.bin");
        assert_eq!(file_name_from_path("/a//b///"), "b");
        assert_eq!(file_name_from_path("/"), DEFAULT_FILE_NAME);
        assert_eq!(file_name_from_path(""), DEFAULT_FILE_NAME);
    }
}
