use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::data::Location;
use crate::error::ClassifyError;

static BLOB_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.blob\.(core\.windows\.net|core\.usgovcloudapi\.net|core\.chinacloudapi\.cn)$")
        .expect("static pattern")
});

static FILE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.file\.(core\.windows\.net|core\.usgovcloudapi\.net|core\.chinacloudapi\.cn)$")
        .expect("static pattern")
});

static DFS_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.dfs\.(core\.windows\.net|core\.usgovcloudapi\.net|core\.chinacloudapi\.cn)$")
        .expect("static pattern")
});

static S3_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+\.)?s3[.-]([a-z0-9-]+\.)?amazonaws\.com$").expect("static pattern")
});

static GCP_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^storage\.cloud\.google\.com$").expect("static pattern"));

/// Classify a source URL, honoring an explicit location override.
///
/// A non-empty `override_location` is parsed as a case-insensitive
/// [`Location`] name and wins even when it contradicts the URL; an unknown
/// name fails without consulting the URL at all.
pub fn classify(raw_url: &str, override_location: &str) -> Result<Location, ClassifyError> {
    if !override_location.is_empty() {
        return override_location.parse();
    }
    infer_location(raw_url)
}

/// Infer the location from the URL alone.
///
/// http/https URLs map to a recognized cloud endpoint or fall through to
/// [`Location::Http`]; scheme-less inputs are local paths; anything else is
/// an error.
pub fn infer_location(raw_url: &str) -> Result<Location, ClassifyError> {
    match Url::parse(raw_url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => Ok(classify_host(parsed.host_str().unwrap_or_default())),
            "file" => Ok(Location::Local),
            // A single-letter scheme is a Windows drive, not a protocol.
            scheme if scheme.len() == 1 => Ok(Location::Local),
            scheme => Err(ClassifyError::UnsupportedScheme(scheme.to_string())),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Location::Local),
        Err(e) => Err(ClassifyError::InvalidUrl(e.to_string())),
    }
}

fn classify_host(host: &str) -> Location {
    if BLOB_HOST.is_match(host) {
        Location::Blob
    } else if FILE_HOST.is_match(host) {
        Location::File
    } else if DFS_HOST.is_match(host) {
        Location::BlobFs
    } else if S3_HOST.is_match(host) {
        Location::S3
    } else if GCP_HOST.is_match(host) {
        Location::Gcp
    } else {
        Location::Http
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_cloud_hosts() {
        let cases = [
            ("https://test.blob.core.windows.net/container8", Location::Blob),
            ("https://test.file.core.windows.net/container23", Location::File),
            ("https://test.dfs.core.windows.net/container45", Location::BlobFs),
            ("https://s3.amazonaws.com/bucket", Location::S3),
            ("https://storage.cloud.google.com/bucket", Location::Gcp),
        ];
        for (url, expected) in cases {
            assert_eq!(infer_location(url).unwrap(), expected, "{url}");
        }
    }

    #[test]
    fn test_infer_regional_s3() {
        assert_eq!(
            infer_location("https://s3.us-east-1.amazonaws.com/bucket").unwrap(),
            Location::S3
        );
        assert_eq!(
            infer_location("https://mybucket.s3-us-west-2.amazonaws.com/key").unwrap(),
            Location::S3
        );
    }

    #[test]
    fn test_generic_http_urls() {
        let cases = [
            "https://api.example.com/files/data.bin",
            "http://download.example.com/archive.tar.gz",
            "https://cdn.mysite.com/videos/video.mp4",
            "http://localhost:8080/file.txt",
            "http://192.168.1.1:8000/file.dat",
            "http://127.0.0.1:10000/devstoreaccount1/container1",
            "https://privateendpoint.com/container1",
        ];
        for url in cases {
            assert_eq!(infer_location(url).unwrap(), Location::Http, "{url}");
        }
    }

    #[test]
    fn test_cloud_host_never_misread_as_http() {
        // A blob host embedded in the middle of another domain is not Blob.
        assert_eq!(
            infer_location("https://blob.core.windows.net.evil.com/x").unwrap(),
            Location::Http
        );
    }

    #[test]
    fn test_override_wins_over_url() {
        assert_eq!(
            classify("https://privateendpoint.com/container1", "FILE").unwrap(),
            Location::File
        );
        assert_eq!(
            classify("http://127.0.0.1:10000/devstoreaccount1/container1", "BloB").unwrap(),
            Location::Blob
        );
        // The endpoint does not matter when an override is present.
        assert_eq!(
            classify("https://test.file.core.windows.net/container1", "blobfs").unwrap(),
            Location::BlobFs
        );
    }

    #[test]
    fn test_unknown_override_fails() {
        let err = classify("https://privateendpoint.com/container1", "random").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid --location value specified"));
    }

    #[test]
    fn test_no_override_infers() {
        assert_eq!(
            classify("https://test.blob.core.windows.net/container1", "").unwrap(),
            Location::Blob
        );
    }

    #[test]
    fn test_local_paths() {
        assert_eq!(infer_location("/tmp/some/file").unwrap(), Location::Local);
        assert_eq!(infer_location("relative/path").unwrap(), Location::Local);
        assert_eq!(infer_location("file:///tmp/x").unwrap(), Location::Local);
        assert_eq!(infer_location(r"C:\data\file.bin").unwrap(), Location::Local);
    }

    #[test]
    fn test_unsupported_scheme_fails() {
        assert!(matches!(
            infer_location("ftp://example.com/file"),
            Err(ClassifyError::UnsupportedScheme(_))
        ));
    }
}
