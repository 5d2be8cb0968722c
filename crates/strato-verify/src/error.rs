use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("hash mismatch: expected {}, got {}", hex::encode(expected), hex::encode(actual))]
    Mismatch { expected: Vec<u8>, actual: Vec<u8> },
}

pub type Result<T> = std::result::Result<T, VerifyError>;
