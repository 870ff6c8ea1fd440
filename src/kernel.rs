//! The certificate verification kernel.
//!
//! One call to [`AuthenticationKernel::verify`] walks
//! `Start -> IssuerCheck -> RevocationCheck -> IdentityExtraction` and ends in
//! exactly one [`Outcome`]. The kernel keeps no state between calls; the only
//! shared data is the read-only [`IssuerStore`].

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bon::Builder;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::cert::Certificate;
use crate::config::IdCardConfig;
use crate::error::IdCardError;
use crate::identity::{self, Identity};
use crate::issuer::{self, IssuerStore};
use crate::ocsp::{OcspChecker, RevocationCheck};

/// Category of a failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No certificate was presented.
    NoCertificate,
    /// The certificate's issuer is not in the trusted set. A deployment defect.
    IssuerNotFound,
    /// Revoked, unknown to the responder, or the status could not be established.
    CertificateRevokedOrUnverifiable,
    /// The subject name lacks the attributes an identity is built from.
    IdentityParseError,
    /// Anything unanticipated.
    InternalError,
}

impl FailureKind {
    /// Message bundle key for the user-facing error text.
    pub fn message_key(&self) -> &'static str {
        match self {
            FailureKind::NoCertificate | FailureKind::IdentityParseError => {
                "message.idc.nocertificate"
            }
            FailureKind::CertificateRevokedOrUnverifiable => "message.idc.revoked",
            FailureKind::IssuerNotFound | FailureKind::InternalError => "message.general.error",
        }
    }

    /// Whether the failure points at the deployment rather than the user.
    pub fn is_operator_facing(&self) -> bool {
        matches!(self, FailureKind::IssuerNotFound | FailureKind::InternalError)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::NoCertificate => "no certificate",
            FailureKind::IssuerNotFound => "issuer not found",
            FailureKind::CertificateRevokedOrUnverifiable => "certificate revoked or unverifiable",
            FailureKind::IdentityParseError => "identity parse error",
            FailureKind::InternalError => "internal error",
        };
        f.write_str(name)
    }
}

/// A failed verification with an optional raw diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    /// Unlocalized detail for logs and audit events.
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Failure {
            kind,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind, detail),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// The single terminal result of one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Identity),
    Failure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The failure kind, or `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure.kind),
        }
    }
}

/// Verifies presented certificates against the trusted issuers.
///
/// # Fields
/// * `issuers` - The trusted issuer set, shared read-only.
/// * `ocsp_enabled` - When false, issuer lookup and revocation checking are skipped.
/// * `ocsp_url` - Responder URL passed to the revocation checker.
/// * `revocation` - The revocation checker.
#[derive(Builder)]
pub struct AuthenticationKernel<R: RevocationCheck> {
    issuers: Arc<IssuerStore>,
    #[builder(default)]
    ocsp_enabled: bool,
    #[builder(into)]
    ocsp_url: Option<String>,
    revocation: R,
}

impl AuthenticationKernel<OcspChecker> {
    /// Builds the OCSP-backed kernel from configuration.
    pub fn from_config(
        config: &IdCardConfig,
        issuers: Arc<IssuerStore>,
    ) -> Result<Self, IdCardError> {
        config.validate()?;
        if config.ocsp.enabled && issuers.is_empty() {
            return Err(IdCardError::ConfigError(
                "OCSP is enabled but no trusted issuer certificates were loaded".to_string(),
            ));
        }
        Ok(AuthenticationKernel {
            issuers,
            ocsp_enabled: config.ocsp.enabled,
            ocsp_url: config.ocsp.url.clone(),
            revocation: OcspChecker::new(&config.ocsp)?,
        })
    }
}

impl<R: RevocationCheck> AuthenticationKernel<R> {
    /// Verifies `certificate` and extracts the holder's identity.
    ///
    /// Never panics and never returns an untyped error: a panic raised while
    /// verifying becomes `Failure(InternalError)`.
    pub async fn verify(&self, certificate: Option<&Certificate>) -> Outcome {
        let outcome = match AssertUnwindSafe(self.run(certificate)).catch_unwind().await {
            Ok(Ok(identity)) => Outcome::Success(identity),
            Ok(Err(failure)) => Outcome::Failure(failure),
            Err(panic) => Outcome::Failure(Failure::new(
                FailureKind::InternalError,
                panic_message(panic.as_ref()),
            )),
        };

        match &outcome {
            Outcome::Success(identity) => {
                info!(person_code = %identity.person_code, "ID-card certificate verified");
            }
            Outcome::Failure(failure) if failure.kind.is_operator_facing() => {
                error!(kind = ?failure.kind, detail = ?failure.detail, "ID-card verification failed");
            }
            Outcome::Failure(failure) => {
                warn!(kind = ?failure.kind, detail = ?failure.detail, "ID-card verification failed");
            }
        }
        outcome
    }

    async fn run(&self, certificate: Option<&Certificate>) -> Result<Identity, Failure> {
        let certificate = certificate.ok_or_else(|| {
            Failure::new(
                FailureKind::NoCertificate,
                "Unable to find certificate from session",
            )
        })?;

        if self.ocsp_enabled {
            self.check_revocation(certificate).await?;
        } else {
            debug!("OCSP disabled, skipping issuer and revocation checks");
        }

        identity::extract(certificate)
            .map_err(|e| Failure::new(FailureKind::IdentityParseError, e.to_string()))
    }

    async fn check_revocation(&self, certificate: &Certificate) -> Result<(), Failure> {
        let issuer = issuer::resolve(certificate, &self.issuers).ok_or_else(|| {
            let claimed = certificate
                .issuer_common_name()
                .ok()
                .flatten()
                .unwrap_or_else(|| "<none>".to_string());
            Failure::new(
                FailureKind::IssuerNotFound,
                format!("Issuer cert not found from setup: {claimed}"),
            )
        })?;

        let verdict = self
            .revocation
            .check(certificate, issuer, self.ocsp_url.as_deref())
            .await
            .map_err(|e| {
                Failure::new(FailureKind::CertificateRevokedOrUnverifiable, e.to_string())
            })?;

        if verdict.is_good() {
            Ok(())
        } else {
            Err(Failure::new(
                FailureKind::CertificateRevokedOrUnverifiable,
                format!("OCSP verdict: {verdict:?}"),
            ))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "verification panicked".to_string()
    }
}
