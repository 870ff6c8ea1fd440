use der::asn1::{Any, OctetString};
use der::{Encode, Tag};
use sha1::{Digest, Sha1};
use x509_cert::ext::Extension;
use x509_cert::spki::AlgorithmIdentifierOwned;

use super::asn1::{CertId, ID_PKIX_OCSP_NONCE, ID_SHA1, OcspRequest, Request, TbsRequest, Version};
use crate::cert::Certificate;
use crate::error::IdCardError;

/// Length of the random request nonce, as recommended by RFC 8954.
pub const NONCE_LENGTH: usize = 32;

/// A DER-encoded OCSP request together with what the response must echo.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Identifies the certificate whose status is asked.
    pub cert_id: CertId,
    /// The nonce sent in the request extension, if any.
    pub nonce: Option<Vec<u8>>,
    /// DER of the `OCSPRequest`.
    pub der: Vec<u8>,
}

/// Builds the CertID binding `subject`'s serial number to `issuer`.
///
/// Both hashes are SHA-1: of the DER issuer subject name and of the issuer's
/// public key bit string (excluding tag, length and unused-bits octet).
pub fn cert_id(subject: &Certificate, issuer: &Certificate) -> Result<CertId, IdCardError> {
    let issuer_tbs = &issuer.inner.tbs_certificate;
    let issuer_name_hash = Sha1::digest(issuer_tbs.subject.to_der()?);
    let issuer_key_hash = Sha1::digest(
        issuer_tbs
            .subject_public_key_info
            .subject_public_key
            .raw_bytes(),
    );

    Ok(CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: ID_SHA1,
            parameters: Some(Any::new(Tag::Null, Vec::new())?),
        },
        issuer_name_hash: OctetString::new(issuer_name_hash.to_vec())?,
        issuer_key_hash: OctetString::new(issuer_key_hash.to_vec())?,
        serial_number: subject.inner.tbs_certificate.serial_number.clone(),
    })
}

/// Builds the nonce request extension.
///
/// The extension value is a DER OCTET STRING wrapping the nonce (RFC 8954).
pub fn nonce_extension(nonce: &[u8]) -> Result<Extension, IdCardError> {
    let inner = OctetString::new(nonce.to_vec())?.to_der()?;
    Ok(Extension {
        extn_id: ID_PKIX_OCSP_NONCE,
        critical: false,
        extn_value: OctetString::new(inner)?,
    })
}

/// Builds an unsigned single-certificate OCSP request.
///
/// # Arguments
/// * `subject` - The certificate whose revocation status is queried.
/// * `issuer` - The trusted issuer of `subject`.
/// * `with_nonce` - Whether to attach a fresh random nonce.
pub fn build(
    subject: &Certificate,
    issuer: &Certificate,
    with_nonce: bool,
) -> Result<PreparedRequest, IdCardError> {
    let cert_id = cert_id(subject, issuer)?;

    let nonce = with_nonce.then(|| rand::random::<[u8; NONCE_LENGTH]>().to_vec());
    let request_extensions = nonce
        .as_deref()
        .map(|nonce| nonce_extension(nonce).map(|ext| vec![ext]))
        .transpose()?;

    let request = OcspRequest {
        tbs_request: TbsRequest {
            version: Version::V1,
            requestor_name: None,
            request_list: vec![Request {
                req_cert: cert_id.clone(),
                single_request_extensions: None,
            }],
            request_extensions,
        },
    };

    let der = request
        .to_der()
        .map_err(|e| IdCardError::EncodingError(e.to_string()))?;

    Ok(PreparedRequest { cert_id, nonce, der })
}
