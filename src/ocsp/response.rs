use std::time::{Duration, SystemTime};

use der::Decode;
use sha1::{Digest, Sha1};
use time::OffsetDateTime;
use tracing::debug;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use super::asn1::{
    BasicOcspResponse, CertStatus, ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NONCE, OcspResponse,
    OcspResponseStatus, ResponderId, ResponseData, SignedCertificate, SingleResponse,
};
use super::request::PreparedRequest;
use super::signature;
use super::{RevocationError, RevocationVerdict};
use crate::cert::Certificate;

/// Freshness rules applied to a response's validity window.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    /// Tolerated clock difference between this host and the responder.
    pub accepted_clock_skew: Duration,
    /// Maximum age of `thisUpdate`.
    pub response_lifetime: Duration,
}

/// Validates a DER `OCSPResponse` for `request` and returns the verdict.
///
/// Any response that cannot be trusted is an error, never a verdict.
///
/// # Arguments
/// * `body` - The responder's DER-encoded reply.
/// * `request` - The request the reply answers.
/// * `issuer` - The trusted issuer of the queried certificate.
/// * `policy` - Freshness rules.
/// * `now` - The current time.
pub fn interpret(
    body: &[u8],
    request: &PreparedRequest,
    issuer: &Certificate,
    policy: &FreshnessPolicy,
    now: OffsetDateTime,
) -> Result<RevocationVerdict, RevocationError> {
    let response = OcspResponse::from_der(body)
        .map_err(|e| RevocationError::Malformed(format!("OCSPResponse: {e}")))?;

    if response.response_status != OcspResponseStatus::Successful {
        debug!(status = ?response.response_status, "OCSP responder declined the request");
        return Ok(RevocationVerdict::ResponderError(response.response_status));
    }

    let bytes = response.response_bytes.ok_or_else(|| {
        RevocationError::Malformed("successful response carries no response bytes".to_string())
    })?;
    if bytes.response_type != ID_PKIX_OCSP_BASIC {
        return Err(RevocationError::UnsupportedResponseType(
            bytes.response_type.to_string(),
        ));
    }

    let basic = BasicOcspResponse::from_der(bytes.response.as_bytes())
        .map_err(|e| RevocationError::Malformed(format!("BasicOCSPResponse: {e}")))?;
    let data = basic
        .response_data()
        .map_err(|e| RevocationError::Malformed(format!("ResponseData: {e}")))?;

    verify_response_signature(&basic, &data, issuer, now)?;

    if let Some(nonce) = &request.nonce {
        check_nonce(&data, nonce)?;
    }

    let single = data
        .responses
        .iter()
        .find(|single| single.cert_id.matches(&request.cert_id))
        .ok_or(RevocationError::CertIdMismatch)?;

    check_freshness(single, policy, now)?;

    Ok(match &single.cert_status {
        CertStatus::Good(_) => RevocationVerdict::Good,
        CertStatus::Revoked(info) => RevocationVerdict::Revoked {
            revoked_at: OffsetDateTime::from(info.revocation_time.to_system_time()),
            reason: info.revocation_reason,
        },
        CertStatus::Unknown(_) => RevocationVerdict::Unknown,
    })
}

/// Checks the response signature against the issuer or an issuer-authorised
/// responder certificate carried in the response.
///
/// Signatures are verified over the bytes as received, never a re-encoding.
fn verify_response_signature(
    basic: &BasicOcspResponse,
    data: &ResponseData,
    issuer: &Certificate,
    now: OffsetDateTime,
) -> Result<(), RevocationError> {
    let signer = select_signer(basic, &data.responder_id, issuer, now)?;

    let tbs = basic
        .signed_bytes()
        .map_err(|e| RevocationError::Malformed(e.to_string()))?;
    let signature = basic.signature.as_bytes().ok_or_else(|| {
        RevocationError::Malformed("signature bit string is not octet aligned".to_string())
    })?;

    signature::verify(&signer, &basic.signature_algorithm, &tbs, signature)
        .map_err(|e| RevocationError::Signature(e.to_string()))
}

fn select_signer(
    basic: &BasicOcspResponse,
    responder_id: &ResponderId,
    issuer: &Certificate,
    now: OffsetDateTime,
) -> Result<SubjectPublicKeyInfoOwned, RevocationError> {
    let issuer_tbs = &issuer.inner.tbs_certificate;
    if identifies(responder_id, &issuer_tbs.subject, &issuer_tbs.subject_public_key_info) {
        debug!("OCSP response signed by the issuer");
        return Ok(issuer_tbs.subject_public_key_info.clone());
    }

    for signed in basic.certs.iter().flatten() {
        let delegate = signed
            .decode()
            .map_err(|e| RevocationError::Malformed(format!("responder certificate: {e}")))?;
        let delegate_tbs = &delegate.tbs_certificate;
        if identifies(responder_id, &delegate_tbs.subject, &delegate_tbs.subject_public_key_info) {
            authorize_delegate(signed, &delegate, issuer, now)?;
            debug!("OCSP response signed by a delegated responder");
            return Ok(delegate_tbs.subject_public_key_info.clone());
        }
    }

    Err(RevocationError::UntrustedResponder(
        "response is not signed by the issuer or an included responder".to_string(),
    ))
}

/// A delegated responder must be issued and signed by the issuer, be within
/// its validity period and carry the OCSP signing key purpose.
fn authorize_delegate(
    signed: &SignedCertificate,
    delegate: &x509_cert::Certificate,
    issuer: &Certificate,
    now: OffsetDateTime,
) -> Result<(), RevocationError> {
    let issuer_tbs = &issuer.inner.tbs_certificate;
    let delegate_tbs = &delegate.tbs_certificate;

    if delegate_tbs.issuer != issuer_tbs.subject {
        return Err(RevocationError::UntrustedResponder(
            "responder certificate was not issued by the certificate issuer".to_string(),
        ));
    }

    let tbs = signed
        .signed_bytes()
        .map_err(|e| RevocationError::Malformed(e.to_string()))?;
    let signature = signed.signature.as_bytes().ok_or_else(|| {
        RevocationError::Malformed("responder certificate signature is not octet aligned".to_string())
    })?;
    signature::verify(
        &issuer_tbs.subject_public_key_info,
        &signed.signature_algorithm,
        &tbs,
        signature,
    )
    .map_err(|e| RevocationError::UntrustedResponder(format!("responder certificate: {e}")))?;

    let not_before = OffsetDateTime::from(delegate_tbs.validity.not_before.to_system_time());
    let not_after = OffsetDateTime::from(delegate_tbs.validity.not_after.to_system_time());
    if now < not_before || now > not_after {
        return Err(RevocationError::UntrustedResponder(
            "responder certificate is outside its validity period".to_string(),
        ));
    }

    let delegate = Certificate {
        inner: delegate.clone(),
    };
    let permitted = delegate
        .has_ocsp_signing_usage()
        .map_err(|e| RevocationError::Malformed(e.to_string()))?;
    if !permitted {
        return Err(RevocationError::UntrustedResponder(
            "responder certificate lacks the OCSP signing key purpose".to_string(),
        ));
    }

    Ok(())
}

fn identifies(responder_id: &ResponderId, subject: &Name, spki: &SubjectPublicKeyInfoOwned) -> bool {
    match responder_id {
        ResponderId::ByName(name) => name == subject,
        ResponderId::ByKey(hash) => {
            hash.as_bytes() == Sha1::digest(spki.subject_public_key.raw_bytes()).as_slice()
        }
    }
}

/// The nonce must be echoed, either DER-wrapped (RFC 8954) or raw.
fn check_nonce(data: &ResponseData, nonce: &[u8]) -> Result<(), RevocationError> {
    let echoed = data
        .response_extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == ID_PKIX_OCSP_NONCE)
        .ok_or(RevocationError::NonceMismatch)?;

    let value = echoed.extn_value.as_bytes();
    let wrapped = der::asn1::OctetString::from_der(value)
        .map(|inner| inner.as_bytes() == nonce)
        .unwrap_or(false);

    if wrapped || value == nonce {
        Ok(())
    } else {
        Err(RevocationError::NonceMismatch)
    }
}

/// Applies the freshness rules. Arithmetic saturates, so an oversized
/// lifetime or skew only widens the window.
fn check_freshness(
    single: &SingleResponse,
    policy: &FreshnessPolicy,
    now: OffsetDateTime,
) -> Result<(), RevocationError> {
    let now = SystemTime::from(now);
    let this_update = single.this_update.to_system_time();

    if let Ok(ahead) = this_update.duration_since(now) {
        if ahead > policy.accepted_clock_skew {
            return Err(RevocationError::Stale(format!(
                "thisUpdate {} is in the future",
                single.this_update.to_date_time()
            )));
        }
    }

    let max_age = policy
        .response_lifetime
        .saturating_add(policy.accepted_clock_skew);
    if let Ok(age) = now.duration_since(this_update) {
        if age > max_age {
            return Err(RevocationError::Stale(format!(
                "thisUpdate {} is older than the accepted response lifetime",
                single.this_update.to_date_time()
            )));
        }
    }

    if let Some(next_update) = &single.next_update {
        if let Ok(overdue) = now.duration_since(next_update.to_system_time()) {
            if overdue > policy.accepted_clock_skew {
                return Err(RevocationError::Stale(format!(
                    "nextUpdate {} has passed",
                    next_update.to_date_time()
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsp::asn1::{CertId, ID_SHA1};
    use der::asn1::{GeneralizedTime, Null, OctetString};
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::AlgorithmIdentifierOwned;

    const DEFAULT_POLICY: FreshnessPolicy = FreshnessPolicy {
        accepted_clock_skew: Duration::from_secs(120),
        response_lifetime: Duration::from_secs(900),
    };

    fn single(this_update: SystemTime, next_update: Option<SystemTime>) -> SingleResponse {
        SingleResponse {
            cert_id: CertId {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: ID_SHA1,
                    parameters: None,
                },
                issuer_name_hash: OctetString::new(vec![0u8; 20]).unwrap(),
                issuer_key_hash: OctetString::new(vec![0u8; 20]).unwrap(),
                serial_number: SerialNumber::new(&[0x01]).unwrap(),
            },
            cert_status: CertStatus::Good(Null),
            this_update: GeneralizedTime::from_system_time(this_update).unwrap(),
            next_update: next_update.map(|t| GeneralizedTime::from_system_time(t).unwrap()),
            single_extensions: None,
        }
    }

    fn hours(n: u64) -> Duration {
        Duration::from_secs(n * 3600)
    }

    #[test]
    fn fresh_response_passes() {
        let now = SystemTime::now();
        let response = single(now - Duration::from_secs(10), Some(now + hours(1)));
        assert!(check_freshness(&response, &DEFAULT_POLICY, now.into()).is_ok());
    }

    #[test]
    fn old_future_and_expired_responses_are_stale() {
        let now = SystemTime::now();
        for response in [
            single(now - hours(2), None),
            single(now + hours(1), None),
            single(now - Duration::from_secs(600), Some(now - Duration::from_secs(300))),
        ] {
            assert!(matches!(
                check_freshness(&response, &DEFAULT_POLICY, now.into()),
                Err(RevocationError::Stale(_))
            ));
        }
    }

    #[test]
    fn huge_lifetime_and_skew_do_not_overflow() {
        let now = SystemTime::now();
        let policy = FreshnessPolicy {
            accepted_clock_skew: Duration::from_secs(u64::MAX),
            response_lifetime: Duration::from_secs(u64::MAX),
        };

        let old = single(now - hours(24 * 365), Some(now - hours(1)));
        assert!(check_freshness(&old, &policy, now.into()).is_ok());

        let ahead = single(now + hours(24), None);
        assert!(check_freshness(&ahead, &policy, now.into()).is_ok());
    }
}
