//! Identity extraction from the certificate subject name.
//!
//! The person code is the deployment's fixed country prefix followed by the
//! subject `SERIALNUMBER`; first and last name come from `GIVENNAME` and
//! `SURNAME`. All three attributes must be present and non-empty.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;

/// Country prefix prepended to the subject serial number.
pub const PERSON_CODE_PREFIX: &str = "EE";

const SERIAL_NUMBER: &str = "SERIALNUMBER";
const GIVEN_NAME: &str = "GIVENNAME";
const SURNAME: &str = "SURNAME";

/// The authenticated person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Country-prefixed national identification code, e.g. `EE47101010033`.
    pub person_code: String,
    pub first_name: String,
    pub last_name: String,
}

/// Why a subject name could not be turned into an [`Identity`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The name could not be decomposed into attributes.
    #[error("Malformed subject name: {0}")]
    MalformedName(String),

    /// A required attribute is absent or empty.
    #[error("Subject name has no {0} attribute")]
    MissingAttribute(&'static str),
}

impl Identity {
    /// Builds an identity from a decoded subject name.
    ///
    /// Duplicate attributes resolve to the first occurrence.
    pub fn from_distinguished_name(dn: &DistinguishedName) -> Result<Self, IdentityError> {
        let serial_number = required(dn, SERIAL_NUMBER)?;
        let first_name = required(dn, GIVEN_NAME)?;
        let last_name = required(dn, SURNAME)?;

        Ok(Identity {
            person_code: format!("{PERSON_CODE_PREFIX}{serial_number}"),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }

    /// Builds an identity from a textual subject name such as
    /// `SERIALNUMBER=47101010033, GIVENNAME=MARI-LIIS, SURNAME=MÄNNIK`.
    pub fn from_dn_str(dn: &str) -> Result<Self, IdentityError> {
        let dn = DistinguishedName::parse(dn)
            .map_err(|e| IdentityError::MalformedName(e.to_string()))?;
        Self::from_distinguished_name(&dn)
    }
}

/// Extracts the identity from the certificate's subject name.
pub fn extract(certificate: &Certificate) -> Result<Identity, IdentityError> {
    let subject = certificate
        .subject()
        .map_err(|e| IdentityError::MalformedName(e.to_string()))?;
    Identity::from_distinguished_name(&subject)
}

fn required<'a>(dn: &'a DistinguishedName, key: &'static str) -> Result<&'a str, IdentityError> {
    match dn.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(IdentityError::MissingAttribute(key)),
    }
}
