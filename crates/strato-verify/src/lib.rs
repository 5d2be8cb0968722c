//! Content verification primitives for downloaded resources.
//!
//! Provides incremental hashing without enforcing a specific hash algorithm
//! or verification policy. The transfer engine feeds bytes through a
//! [`Hasher`] in write order, so the digest is computed in the same pass
//! that materializes the file.
//!
//! # Key Features
//!
//! - **Single-pass**: bytes are hashed as they are written, never re-read
//! - **Incremental**: digests accumulate as data streams through
//! - **Extensible**: the minimal [`Hasher`] trait allows custom implementations
//!
//! # Example
//!
//! ```
//! use strato_verify::{Hasher, Md5Hasher, verify};
//!
//! let mut hasher = Md5Hasher::new();
//! hasher.update(b"hello ");
//! hasher.update(b"world");
//!
//! let expected = Md5Hasher::digest(b"hello world");
//! verify(&hasher.finalize(), &expected).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::hasher::{DigestHasher, Hasher};

#[cfg(feature = "md5")]
pub use self::hasher::Md5Hasher;

#[cfg(feature = "sha256")]
pub use self::hasher::Sha256Hasher;

mod error;
mod hasher;

/// Compare a computed digest against an expected one.
///
/// Returns [`VerifyError::Mismatch`] carrying both values when they differ,
/// so callers can render them without recomputing.
pub fn verify(actual: &[u8], expected: &[u8]) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(VerifyError::Mismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}
