//! The ID-card login step and the collaborators it talks to.
//!
//! The surrounding web flow stages the client certificate in a session store
//! before this step runs. [`IdCardLogin::login`] verifies it, stores the
//! resulting credential, emits audit events and always removes the staged
//! certificate, including when the login future is dropped mid-flight.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::cert::Certificate;
use crate::identity::Identity;
use crate::kernel::{AuthenticationKernel, Outcome};
use crate::ocsp::RevocationCheck;

/// Session attribute holding the staged client certificate.
pub const CERTIFICATE_SESSION_ATTRIBUTE: &str = "certificate";

/// Flow scope slot receiving the credential on success.
pub const CREDENTIAL_ATTRIBUTE: &str = "credential";

/// Authentication method tag used in audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationType {
    #[serde(rename = "IDCard")]
    IdCard,
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationType::IdCard => f.write_str("IDCard"),
        }
    }
}

/// The authentication result handed back to the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub auth_type: AuthenticationType,
    #[serde(flatten)]
    pub identity: Identity,
}

/// Per-request state owned by the web flow.
pub trait SessionStore: Send {
    /// The certificate staged under [`CERTIFICATE_SESSION_ATTRIBUTE`].
    fn certificate(&self) -> Option<Certificate>;

    /// Removes the staged certificate.
    fn remove_certificate(&mut self);

    /// Stores the credential under [`CREDENTIAL_ATTRIBUTE`].
    fn store_credential(&mut self, credential: Credential);

    /// Drops everything the flow accumulated for this attempt.
    fn clear_flow_scope(&mut self);
}

/// Audited step of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOperation {
    StartAuth,
    SuccessfulAuth,
    Error(String),
}

/// A timestamped audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub at: OffsetDateTime,
    pub method: AuthenticationType,
    pub operation: AuditOperation,
}

impl AuditEvent {
    pub fn now(operation: AuditOperation) -> Self {
        AuditEvent {
            at: OffsetDateTime::now_utc(),
            method: AuthenticationType::IdCard,
            operation,
        }
    }
}

/// Receives audit and statistics events.
pub trait AuditSink: Send + Sync {
    fn collect(&self, event: AuditEvent);
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn collect(&self, event: AuditEvent) {
        match &event.operation {
            AuditOperation::StartAuth => {
                info!(target: "audit", at = %event.at, method = %event.method, "START_AUTH");
            }
            AuditOperation::SuccessfulAuth => {
                info!(target: "audit", at = %event.at, method = %event.method, "SUCCESSFUL_AUTH");
            }
            AuditOperation::Error(message) => {
                info!(target: "audit", at = %event.at, method = %event.method, error = %message, "ERROR");
            }
        }
    }
}

/// In-memory session, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySession {
    attributes: HashMap<String, Certificate>,
    flow_scope: HashMap<String, Credential>,
}

impl MemorySession {
    /// A session with `certificate` staged.
    pub fn with_certificate(certificate: Certificate) -> Self {
        let mut session = MemorySession::default();
        session
            .attributes
            .insert(CERTIFICATE_SESSION_ATTRIBUTE.to_string(), certificate);
        session
    }

    pub fn has_certificate(&self) -> bool {
        self.attributes.contains_key(CERTIFICATE_SESSION_ATTRIBUTE)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.flow_scope.get(CREDENTIAL_ATTRIBUTE)
    }
}

impl SessionStore for MemorySession {
    fn certificate(&self) -> Option<Certificate> {
        self.attributes.get(CERTIFICATE_SESSION_ATTRIBUTE).cloned()
    }

    fn remove_certificate(&mut self) {
        self.attributes.remove(CERTIFICATE_SESSION_ATTRIBUTE);
    }

    fn store_credential(&mut self, credential: Credential) {
        self.flow_scope
            .insert(CREDENTIAL_ATTRIBUTE.to_string(), credential);
    }

    fn clear_flow_scope(&mut self) {
        self.flow_scope.clear();
    }
}

/// Removes the staged certificate when dropped.
struct StagedCertificate<'a, S: SessionStore + ?Sized> {
    session: &'a mut S,
}

impl<S: SessionStore + ?Sized> Drop for StagedCertificate<'_, S> {
    fn drop(&mut self) {
        self.session.remove_certificate();
    }
}

/// The ID-card login step.
pub struct IdCardLogin<R: RevocationCheck, A: AuditSink = TracingAuditSink> {
    kernel: AuthenticationKernel<R>,
    audit: A,
}

impl<R: RevocationCheck, A: AuditSink> IdCardLogin<R, A> {
    pub fn new(kernel: AuthenticationKernel<R>, audit: A) -> Self {
        IdCardLogin { kernel, audit }
    }

    /// Authenticates the certificate staged in `session`.
    ///
    /// On success the credential is stored in the flow scope; on failure the
    /// flow scope is cleared. The staged certificate is removed either way.
    pub async fn login<S: SessionStore + ?Sized>(&self, session: &mut S) -> Outcome {
        self.audit.collect(AuditEvent::now(AuditOperation::StartAuth));

        let staged = StagedCertificate { session };
        let certificate = staged.session.certificate();
        let outcome = self.kernel.verify(certificate.as_ref()).await;

        match &outcome {
            Outcome::Success(identity) => {
                staged.session.store_credential(Credential {
                    auth_type: AuthenticationType::IdCard,
                    identity: identity.clone(),
                });
                self.audit
                    .collect(AuditEvent::now(AuditOperation::SuccessfulAuth));
            }
            Outcome::Failure(failure) => {
                staged.session.clear_flow_scope();
                self.audit
                    .collect(AuditEvent::now(AuditOperation::Error(failure.to_string())));
            }
        }

        outcome
    }
}
