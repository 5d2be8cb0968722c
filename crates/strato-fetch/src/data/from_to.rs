use std::fmt;

use super::location::Location;

/// Source/destination pairing of a transfer, packed as `from << 8 | to`.
///
/// The job layer routes on this value; the core only defines the pairs it
/// can serve. Packing keeps the value cheap to copy, hash, and match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FromTo(u16);

impl FromTo {
    pub fn new(from: Location, to: Location) -> Self {
        Self(((from as u16) << 8) | to as u16)
    }

    /// Download from a generic HTTP endpoint to the local filesystem — the
    /// pair this crate implements.
    pub fn http_local() -> Self {
        Self::new(Location::Http, Location::Local)
    }

    pub fn from(&self) -> Location {
        Location::from_u8((self.0 >> 8) as u8)
    }

    pub fn to(&self) -> Location {
        Location::from_u8((self.0 & 0xff) as u8)
    }

    /// True when the source is remote and the destination local.
    pub fn is_download(&self) -> bool {
        self.from().is_remote() && self.to().is_local()
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from(), self.to())
    }
}
