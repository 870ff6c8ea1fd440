use const_oid::AssociatedOid;
use der::{Decode, oid::ObjectIdentifier};
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::IdCardError;

/// Access method of an OCSP responder location (`id-ad-ocsp`).
pub const ID_AD_OCSP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");

/// Extended key usage permitting a certificate to sign OCSP responses.
pub const ID_KP_OCSP_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.9");

/// Trait for decoding typed views of X.509 extensions.
///
/// Only the extensions consulted during verification are modelled.
pub trait FromX509Extension: Sized {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, IdCardError>;

    /// Finds and decodes this extension in a certificate's extension list.
    ///
    /// # Returns
    /// `Ok(None)` when the extension is absent.
    fn find(extensions: Option<&[Extension]>) -> Result<Option<Self>, IdCardError> {
        extensions
            .unwrap_or_default()
            .iter()
            .find(|ext| ext.extn_id == Self::OID)
            .map(|ext| Self::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }
}

/// Represents the Authority Information Access extension.
///
/// # Fields
/// * `ocsp_urls` - URIs of OCSP responders for the certificate, in encoded order.
#[derive(Debug, Clone, Default)]
pub struct AuthorityInfoAccess {
    pub ocsp_urls: Vec<String>,
}

impl FromX509Extension for AuthorityInfoAccess {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityInfoAccessSyntax::OID;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, IdCardError> {
        let aia = x509_cert::ext::pkix::AuthorityInfoAccessSyntax::from_der(extension)?;
        let ocsp_urls = aia
            .0
            .iter()
            .filter(|desc| desc.access_method == ID_AD_OCSP)
            .filter_map(|desc| match &desc.access_location {
                GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                _ => None,
            })
            .collect();
        Ok(Self { ocsp_urls })
    }
}

/// Represents the Extended Key Usage extension.
///
/// # Fields
/// * `usages` - Key purpose OIDs.
#[derive(Debug, Clone, Default)]
pub struct ExtendedKeyUsage {
    pub usages: Vec<ObjectIdentifier>,
}

impl ExtendedKeyUsage {
    pub fn permits_ocsp_signing(&self) -> bool {
        self.usages.contains(&ID_KP_OCSP_SIGNING)
    }
}

impl FromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, IdCardError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        Ok(Self { usages: eku.0 })
    }
}
