pub mod extensions;
pub mod params;

use crate::error::IdCardError;
pub type Result<T> = std::result::Result<T, IdCardError>;
use der::{Decode, Encode};
use extensions::{AuthorityInfoAccess, ExtendedKeyUsage, FromX509Extension};
use params::DistinguishedName;
use x509_cert::certificate::CertificateInner;
use x509_cert::ext::Extension;

use crate::pem_utils;

/// Represents an X.509 certificate.
///
/// The certificate is immutable once decoded. Verification only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Decodes a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Certificate { inner })
    }

    /// Decodes a PEM-encoded certificate.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der(pem)?)
    }

    /// Decodes every certificate found in a PEM bundle.
    pub fn bundle_from_pem(bundle: &str) -> Result<Vec<Self>> {
        pem_utils::certificate_blocks(bundle)?
            .iter()
            .map(|der| Self::from_der(der))
            .collect()
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| IdCardError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_der()?,
            pem_utils::CERTIFICATE_LABEL,
        ))
    }

    /// Raw big-endian bytes of the certificate serial number.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    /// Serial number as an uppercase hex string, for logging.
    pub fn serial_hex(&self) -> String {
        self.serial_number()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect()
    }

    /// The subject distinguished name, in encoded order.
    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    /// The issuer distinguished name, in encoded order.
    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn subject_common_name(&self) -> Result<Option<String>> {
        Ok(self.subject()?.common_name().map(str::to_string))
    }

    /// Common name of the issuer as claimed by this certificate.
    ///
    /// This is only a lookup key into the trusted issuer set.
    pub fn issuer_common_name(&self) -> Result<Option<String>> {
        Ok(self.issuer()?.common_name().map(str::to_string))
    }

    /// OCSP responder URLs from the Authority Information Access extension.
    pub fn ocsp_responder_urls(&self) -> Result<Vec<String>> {
        Ok(AuthorityInfoAccess::find(self.extensions())?
            .map(|aia| aia.ocsp_urls)
            .unwrap_or_default())
    }

    /// Whether the extended key usage extension allows signing OCSP responses.
    pub fn has_ocsp_signing_usage(&self) -> Result<bool> {
        Ok(ExtendedKeyUsage::find(self.extensions())?
            .is_some_and(|eku| eku.permits_ocsp_signing()))
    }

    fn extensions(&self) -> Option<&[Extension]> {
        self.inner.tbs_certificate.extensions.as_deref()
    }
}
