//! # idcard-auth - Pure Rust ID-card certificate authentication
//!
//! Decides whether the holder of a client-presented X.509 certificate is who
//! they claim to be, and if so extracts a stable identity: a national person
//! code plus given and family name. Built entirely on RustCrypto libraries.
//!
//! ## Verification steps
//!
//! 1. **Issuer lookup**: the certificate's issuer common name selects a
//!    certificate from the configured [`IssuerStore`](issuer::IssuerStore).
//! 2. **Revocation check**: an OCSP request is sent to the responder and the
//!    signed reply is validated against that issuer.
//! 3. **Identity extraction**: `SERIALNUMBER`, `GIVENNAME` and `SURNAME` are
//!    read from the subject name.
//!
//! Steps 1 and 2 run only when OCSP is enabled. Anything short of a `good`
//! revocation status fails the attempt.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use idcard_auth::{
//!     cert::Certificate,
//!     config::IdCardConfig,
//!     issuer::IssuerStore,
//!     kernel::{AuthenticationKernel, Outcome},
//! };
//!
//! # async fn run(client_cert_pem: &str) -> Result<(), idcard_auth::error::IdCardError> {
//! let config = IdCardConfig::from_file("idcard.json")?;
//! let issuers = Arc::new(IssuerStore::load(&config.issuer_certificates)?);
//! let kernel = AuthenticationKernel::from_config(&config, issuers)?;
//!
//! let certificate = Certificate::from_pem(client_cert_pem)?;
//! match kernel.verify(Some(&certificate)).await {
//!     Outcome::Success(identity) => println!("Welcome, {}", identity.first_name),
//!     Outcome::Failure(failure) => println!("Rejected: {}", failure.kind.message_key()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Verification never returns an error: every failure is a
//! [`Failure`](kernel::Failure) inside the [`Outcome`](kernel::Outcome),
//! tagged with a [`FailureKind`](kernel::FailureKind). Setup problems
//! (unreadable configuration, malformed PEM) surface as
//! [`IdCardError`](error::IdCardError):
//!
//! ```rust
//! use idcard_auth::{cert::Certificate, error::IdCardError};
//!
//! match Certificate::from_pem("invalid pem data") {
//!     Ok(_) => println!("Certificate loaded"),
//!     Err(IdCardError::DecodingError(msg)) => println!("Failed to decode certificate: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`cert`]: Certificate decoding and name/extension accessors
//! - [`identity`]: Identity extraction from the subject name
//! - [`issuer`]: Trusted issuer store and lookup
//! - [`ocsp`]: OCSP request building, transport and response validation
//! - [`kernel`]: The verification state machine and its outcome
//! - [`flow`]: Session, audit and login-step collaborators
//! - [`config`]: Configuration
//! - [`error`]: Error types

pub mod cert;
pub mod config;
pub mod error;
pub mod flow;
pub mod identity;
pub mod issuer;
pub mod kernel;
pub mod ocsp;
pub mod pem_utils;
