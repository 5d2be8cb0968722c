use std::fmt;
use std::str::FromStr;

use crate::error::ClassifyError;

/// Storage endpoint family a source URL resolves to.
///
/// The set is closed: each remote variant selects a downloader
/// implementation at transfer construction, and `Http` is the catch-all for
/// any http/https endpoint whose host matches no recognized cloud pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Location {
    #[default]
    Unknown = 0,
    Local = 1,
    Blob = 2,
    File = 3,
    BlobFs = 4,
    S3 = 5,
    Gcp = 6,
    Http = 7,
}

impl Location {
    pub(crate) fn from_u8(value: u8) -> Location {
        match value {
            1 => Location::Local,
            2 => Location::Blob,
            3 => Location::File,
            4 => Location::BlobFs,
            5 => Location::S3,
            6 => Location::Gcp,
            7 => Location::Http,
            _ => Location::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Unknown => "Unknown",
            Location::Local => "Local",
            Location::Blob => "Blob",
            Location::File => "File",
            Location::BlobFs => "BlobFS",
            Location::S3 => "S3",
            Location::Gcp => "GCP",
            Location::Http => "Http",
        }
    }

    /// True for locations reached over the network.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Location::Blob
                | Location::File
                | Location::BlobFs
                | Location::S3
                | Location::Gcp
                | Location::Http
        )
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Location::Local)
    }

    fn all() -> &'static [Location] {
        &[
            Location::Unknown,
            Location::Local,
            Location::Blob,
            Location::File,
            Location::BlobFs,
            Location::S3,
            Location::Gcp,
            Location::Http,
        ]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = ClassifyError;

    /// Case-insensitive parse of a location name, used for explicit
    /// `--location` overrides.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::all()
            .iter()
            .copied()
            .find(|loc| loc.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClassifyError::InvalidOverride(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(Location::Http.to_string(), "Http");
        assert_eq!(Location::BlobFs.to_string(), "BlobFS");
        assert_eq!(Location::Gcp.to_string(), "GCP");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("FILE".parse::<Location>().unwrap(), Location::File);
        assert_eq!("BloB".parse::<Location>().unwrap(), Location::Blob);
        assert_eq!("blobfs".parse::<Location>().unwrap(), Location::BlobFs);
        assert_eq!("Http".parse::<Location>().unwrap(), Location::Http);
    }

    #[test]
    fn test_parse_unknown_name_fails() {
        let err = "random".parse::<Location>().unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid --location value specified"));
    }

    #[test]
    fn test_remote_local_partition() {
        assert!(Location::Http.is_remote());
        assert!(!Location::Http.is_local());
        assert!(Location::Local.is_local());
        assert!(!Location::Local.is_remote());
        assert!(!Location::Unknown.is_remote());
        assert!(!Location::Unknown.is_local());
        for loc in [Location::Blob, Location::File, Location::BlobFs] {
            assert!(loc.is_remote());
        }
    }
}
