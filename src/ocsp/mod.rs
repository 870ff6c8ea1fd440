//! Online revocation checking (RFC 6960).
//!
//! [`OcspChecker`] sends one unsigned request per verification over HTTP and
//! validates the signed reply against the trusted issuer. Verdicts are never
//! cached. Every failure to obtain a trustworthy answer is a
//! [`RevocationError`], distinct from an explicit [`RevocationVerdict`].

pub mod asn1;
pub mod request;
pub mod response;
pub mod signature;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use x509_cert::ext::pkix::crl::CrlReason;

pub use asn1::OcspResponseStatus;
use response::FreshnessPolicy;

use crate::cert::Certificate;
use crate::config::OcspConfig;
use crate::error::IdCardError;

const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
const OCSP_RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

/// The responder's answer about one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationVerdict {
    /// The certificate is not revoked.
    Good,
    /// The certificate has been revoked.
    Revoked {
        revoked_at: OffsetDateTime,
        reason: Option<CrlReason>,
    },
    /// The responder does not know the certificate.
    Unknown,
    /// The responder refused to answer (`tryLater`, `unauthorized`, ...).
    ResponderError(OcspResponseStatus),
}

impl RevocationVerdict {
    /// Only `Good` lets authentication proceed.
    pub fn is_good(&self) -> bool {
        matches!(self, RevocationVerdict::Good)
    }
}

/// Why no trustworthy revocation status could be obtained.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevocationError {
    /// No responder URL configured and none in the certificate.
    #[error("No OCSP responder URL available")]
    NoResponderUrl,

    /// The request could not be built.
    #[error("Failed to build OCSP request: {0}")]
    Request(String),

    /// Connection or protocol failure talking to the responder.
    #[error("OCSP transport error: {0}")]
    Transport(String),

    /// The responder did not answer in time.
    #[error("OCSP request timed out after {0:?}")]
    Timeout(Duration),

    /// The responder answered with a non-success HTTP status.
    #[error("OCSP responder returned HTTP {0}")]
    HttpStatus(u16),

    /// The response could not be decoded.
    #[error("Malformed OCSP response: {0}")]
    Malformed(String),

    #[error("Unsupported OCSP response type {0}")]
    UnsupportedResponseType(String),

    /// The response signature did not verify.
    #[error("OCSP response signature invalid: {0}")]
    Signature(String),

    /// The response was signed by a key not authorised by the issuer.
    #[error("Untrusted OCSP responder: {0}")]
    UntrustedResponder(String),

    /// The request nonce was not echoed.
    #[error("OCSP response nonce missing or mismatched")]
    NonceMismatch,

    /// The response does not cover the queried certificate.
    #[error("OCSP response does not cover the requested certificate")]
    CertIdMismatch,

    /// The response is outside its validity window.
    #[error("OCSP response not fresh: {0}")]
    Stale(String),
}

/// Revocation status lookup used by the kernel.
#[async_trait]
pub trait RevocationCheck: Send + Sync {
    /// Queries the revocation status of `subject`.
    ///
    /// # Arguments
    /// * `subject` - The certificate being verified.
    /// * `issuer` - Its trusted issuer certificate.
    /// * `responder_url` - The responder to ask; implementations may fall
    ///   back to the certificate's own OCSP location when `None`.
    async fn check(
        &self,
        subject: &Certificate,
        issuer: &Certificate,
        responder_url: Option<&str>,
    ) -> Result<RevocationVerdict, RevocationError>;
}

/// OCSP over HTTP POST.
#[derive(Debug, Clone)]
pub struct OcspChecker {
    client: reqwest::Client,
    timeout: Duration,
    nonce: bool,
    freshness: FreshnessPolicy,
}

impl OcspChecker {
    /// Creates a checker with its own HTTP client.
    ///
    /// The client timeout and an outer deadline both use `config.timeout()`.
    pub fn new(config: &OcspConfig) -> Result<Self, IdCardError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| IdCardError::ConfigError(format!("OCSP HTTP client: {e}")))?;

        Ok(OcspChecker {
            client,
            timeout: config.timeout(),
            nonce: config.nonce,
            freshness: FreshnessPolicy {
                accepted_clock_skew: config.accepted_clock_skew(),
                response_lifetime: config.response_lifetime(),
            },
        })
    }

    async fn exchange(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, RevocationError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, OCSP_RESPONSE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(RevocationError::HttpStatus(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, err: reqwest::Error) -> RevocationError {
        if err.is_timeout() {
            RevocationError::Timeout(self.timeout)
        } else {
            RevocationError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RevocationCheck for OcspChecker {
    async fn check(
        &self,
        subject: &Certificate,
        issuer: &Certificate,
        responder_url: Option<&str>,
    ) -> Result<RevocationVerdict, RevocationError> {
        let url = match responder_url {
            Some(url) => url.to_string(),
            None => subject
                .ocsp_responder_urls()
                .ok()
                .and_then(|urls| urls.into_iter().next())
                .ok_or(RevocationError::NoResponderUrl)?,
        };

        let prepared = request::build(subject, issuer, self.nonce)
            .map_err(|e| RevocationError::Request(e.to_string()))?;

        debug!(
            serial = %subject.serial_hex(),
            responder = %url,
            nonce = prepared.nonce.is_some(),
            "Sending OCSP request"
        );

        let body = tokio::time::timeout(self.timeout, self.exchange(&url, prepared.der.clone()))
            .await
            .map_err(|_| RevocationError::Timeout(self.timeout))??;

        let verdict = response::interpret(
            &body,
            &prepared,
            issuer,
            &self.freshness,
            OffsetDateTime::now_utc(),
        );

        match &verdict {
            Ok(v) => info!(serial = %subject.serial_hex(), verdict = ?v, "OCSP check result"),
            Err(e) => warn!(serial = %subject.serial_hex(), error = %e, "OCSP check failed"),
        }
        verdict
    }
}
