use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid parameter set: {0}")]
    InvalidParameters(String),
    #[error("Invalid length: expected {0} bytes, found {1} bytes")]
    BadLength(usize, usize),
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),
    #[error("Signature verification failed: {0}")]
    VerificationFailed(#[from] VerificationError),
    #[error("Signing key exhausted: all {0} one-time keys have been used")]
    KeyExhausted(u64),
    #[error("Signing key state is corrupted: {0}")]
    StateCorruption(String),
    #[error("Database internal error: {0}")]
    DbInternalError(String),
    #[error("Key '{0}' not found")]
    KeyNotFound(String),
    #[error("Refusing to roll key '{0}' back from index {1} to index {2}")]
    StaleState(String, u64, u64),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("one-time signature does not match the carried public values on layer {0}")]
    OtsMismatch(usize),
    #[error("reconstructed root does not match the public key")]
    RootMismatch,
}
