//! use idcard_auth::error::IdCardError;

use thiserror::Error;

/// Represents errors that can occur while loading and inspecting certificates.
///
/// Verification failures are not reported through this type: the kernel turns
/// them into an [`Outcome`](crate::kernel::Outcome). This enum covers decoding,
/// configuration and setup problems.
#[derive(Debug, Error, Clone)]
pub enum IdCardError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error related to certificate contents.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// A signature could not be checked or did not verify.
    #[error("Signature error: {0}")]
    SignatureError(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error reading configuration or certificate files.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<der::Error> for IdCardError {
    /// Converts a `der::Error` into an `IdCardError`.
    fn from(err: der::Error) -> Self {
        IdCardError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for IdCardError {
    fn from(err: pem::PemError) -> Self {
        IdCardError::DecodingError(err.to_string())
    }
}

impl From<std::io::Error> for IdCardError {
    fn from(err: std::io::Error) -> Self {
        IdCardError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IdCardError {
    fn from(err: serde_json::Error) -> Self {
        IdCardError::ConfigError(err.to_string())
    }
}
