//! Error types for kubecheck-core

use thiserror::Error;

/// Errors returned by a cluster query or a host lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The API server could not be reached or refused our credentials
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The API server rejected a well-formed request
    #[error("{message} ({code})")]
    Api { code: u16, message: String },

    /// The response could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A hostname could not be resolved
    #[error("Failed to resolve {host}: {message}")]
    Resolve { host: String, message: String },
}

/// Errors raised while reading a certificate payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// Certificate payload is empty
    #[error("empty payload")]
    Empty,

    /// PEM armor could not be decoded
    #[error("invalid PEM: {0}")]
    Pem(String),

    /// DER content is not a valid X.509 certificate
    #[error("invalid X.509 certificate: {0}")]
    X509(String),

    /// Validity timestamp does not fit a calendar date
    #[error("notAfter out of range: {0}")]
    OutOfRange(i64),
}
