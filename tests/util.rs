#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use const_oid::AssociatedOid;
use der::asn1::{Any, BitString, GeneralizedTime, Ia5String, Null, ObjectIdentifier, OctetString, UtcTime};
use der::{Decode, Encode, Sequence, Tag};
use idcard_auth::cert::Certificate;
use idcard_auth::cert::extensions::{ID_AD_OCSP, ID_KP_OCSP_SIGNING};
use idcard_auth::cert::params::DistinguishedName;
use idcard_auth::ocsp::asn1::{
    BasicOcspResponse, CertId, CertStatus, ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NONCE, OcspRequest,
    OcspResponse, OcspResponseStatus, ResponderId, ResponseBytes, ResponseData, RevokedInfo,
    SignedCertificate, SingleResponse, Version,
};
use idcard_auth::ocsp::request::nonce_extension;
use p256::ecdsa::SigningKey;
use p256::ecdsa::signature::Signer;
use rand_core::OsRng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::crl::CrlReason;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{AccessDescription, AuthorityInfoAccessSyntax, ExtendedKeyUsage};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

pub const ISSUER_CN: &str = "TEST of ESTEID2018";
pub const USER_SERIAL: [u8; 6] = [0x47, 0x10, 0x10, 0x10, 0x03, 0x3A];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A certificate together with the key it certifies.
#[derive(Clone)]
pub struct TestAuthority {
    pub cert: Certificate,
    pub key: SigningKey,
    /// The certificate exactly as encoded by its issuer.
    pub der: Vec<u8>,
}

impl TestAuthority {
    fn new(cert: Certificate, key: SigningKey) -> Self {
        let der = cert.to_der().unwrap();
        TestAuthority { cert, key, der }
    }
}

fn ecdsa_with_sha256() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
        parameters: None,
    }
}

fn utc(time: SystemTime) -> x509_cert::time::Time {
    x509_cert::time::Time::UtcTime(UtcTime::from_system_time(time).unwrap())
}

pub fn generalized(time: SystemTime) -> GeneralizedTime {
    GeneralizedTime::from_system_time(time).unwrap()
}

fn sign(key: &SigningKey, data: &[u8]) -> BitString {
    let signature: p256::ecdsa::Signature = key.sign(data);
    BitString::from_bytes(signature.to_der().as_bytes()).unwrap()
}

/// Builds and signs a certificate for `subject_key`.
fn issue(
    issuer_name: &x509_cert::name::Name,
    signing_key: &SigningKey,
    subject: &DistinguishedName,
    subject_key: &SigningKey,
    serial: &[u8],
    extensions: Vec<Extension>,
) -> Certificate {
    let now = SystemTime::now();
    let tbs = TbsCertificateInner {
        version: x509_cert::Version::V3,
        serial_number: SerialNumber::new(serial).unwrap(),
        signature: ecdsa_with_sha256(),
        issuer: issuer_name.clone(),
        validity: x509_cert::time::Validity {
            not_before: utc(now - Duration::from_secs(24 * 3600)),
            not_after: utc(now + Duration::from_secs(365 * 24 * 3600)),
        },
        subject: subject.as_x509_name().unwrap(),
        subject_public_key_info: SubjectPublicKeyInfoOwned::from_key(*subject_key.verifying_key())
            .unwrap(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };

    let signature = sign(signing_key, &tbs.to_der().unwrap());
    Certificate {
        inner: x509_cert::Certificate {
            tbs_certificate: tbs,
            signature_algorithm: ecdsa_with_sha256(),
            signature,
        },
    }
}

/// A self-signed issuer with the given common name.
pub fn generate_issuer(common_name: &str) -> TestAuthority {
    let key = SigningKey::random(&mut OsRng);
    let subject = DistinguishedName::from_pairs([
        ("C", "EE"),
        ("O", "SK ID Solutions AS"),
        ("CN", common_name),
    ]);
    let name = subject.as_x509_name().unwrap();
    let cert = issue(&name, &key, &subject, &key, &[0x01], vec![]);
    TestAuthority::new(cert, key)
}

/// The subject name of an authentication certificate.
pub fn esteid_subject(serial: &str, given: &str, surname: &str) -> DistinguishedName {
    DistinguishedName::from_pairs([
        ("C", "EE"),
        ("O", "ESTEID"),
        ("OU", "authentication"),
        ("CN", format!("{surname},{given},{serial}").as_str()),
        ("SURNAME", surname),
        ("GIVENNAME", given),
        ("SERIALNUMBER", serial),
    ])
}

/// Issues a user certificate.
pub fn issue_user(issuer: &TestAuthority, subject: &DistinguishedName, serial: &[u8]) -> Certificate {
    issue_user_with_extensions(issuer, subject, serial, vec![])
}

pub fn issue_user_with_extensions(
    issuer: &TestAuthority,
    subject: &DistinguishedName,
    serial: &[u8],
    extensions: Vec<Extension>,
) -> Certificate {
    let key = SigningKey::random(&mut OsRng);
    issue(
        &issuer.cert.inner.tbs_certificate.subject,
        &issuer.key,
        subject,
        &key,
        serial,
        extensions,
    )
}

/// The standard user certificate: MARI-LIIS MÄNNIK, 47101010033.
pub fn mari_liis(issuer: &TestAuthority) -> Certificate {
    issue_user(
        issuer,
        &esteid_subject("47101010033", "MARI-LIIS", "MÄNNIK"),
        &USER_SERIAL,
    )
}

/// An Authority Information Access extension pointing at `url`.
pub fn aia_extension(url: &str) -> Extension {
    let aia = AuthorityInfoAccessSyntax(vec![AccessDescription {
        access_method: ID_AD_OCSP,
        access_location: GeneralName::UniformResourceIdentifier(Ia5String::new(url).unwrap()),
    }]);
    Extension {
        extn_id: AuthorityInfoAccessSyntax::OID,
        critical: false,
        extn_value: OctetString::new(aia.to_der().unwrap()).unwrap(),
    }
}

/// A delegated OCSP responder issued by `issuer`.
pub fn issue_responder(issuer: &TestAuthority, ocsp_signing: bool) -> TestAuthority {
    let key = SigningKey::random(&mut OsRng);
    let mut extensions = vec![];
    if ocsp_signing {
        let eku = ExtendedKeyUsage(vec![ID_KP_OCSP_SIGNING]);
        extensions.push(Extension {
            extn_id: ExtendedKeyUsage::OID,
            critical: false,
            extn_value: OctetString::new(eku.to_der().unwrap()).unwrap(),
        });
    }
    let subject = DistinguishedName::from_pairs([("C", "EE"), ("CN", "TEST of ESTEID2018 AIA OCSP")]);
    let cert = issue(
        &issuer.cert.inner.tbs_certificate.subject,
        &issuer.key,
        &subject,
        &key,
        &[0x02, 0x11],
        extensions,
    );
    TestAuthority::new(cert, key)
}

/// `Extension` with `critical` always encoded, even when it is the DEFAULT.
#[derive(Sequence)]
struct ExplicitExtension {
    extn_id: ObjectIdentifier,
    critical: bool,
    extn_value: OctetString,
}

/// `TBSCertificate` that encodes every extension's `critical` flag.
#[derive(Sequence)]
struct ExplicitTbsCertificate {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    version: x509_cert::Version,
    serial_number: SerialNumber,
    signature: AlgorithmIdentifierOwned,
    issuer: x509_cert::name::Name,
    validity: x509_cert::time::Validity,
    subject: x509_cert::name::Name,
    subject_public_key_info: SubjectPublicKeyInfoOwned,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT")]
    extensions: Vec<ExplicitExtension>,
}

/// A delegated OCSP responder whose TBS carries `critical FALSE` explicitly.
///
/// Decoding and re-encoding this certificate drops those bytes, so only the
/// encoding as issued verifies under the issuer signature.
pub fn issue_responder_with_explicit_defaults(issuer: &TestAuthority) -> TestAuthority {
    let template = issue_responder(issuer, true);
    let tbs = &template.cert.inner.tbs_certificate;

    let explicit = ExplicitTbsCertificate {
        version: tbs.version,
        serial_number: tbs.serial_number.clone(),
        signature: tbs.signature.clone(),
        issuer: tbs.issuer.clone(),
        validity: tbs.validity,
        subject: tbs.subject.clone(),
        subject_public_key_info: tbs.subject_public_key_info.clone(),
        extensions: tbs
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExplicitExtension {
                extn_id: ext.extn_id,
                critical: ext.critical,
                extn_value: ext.extn_value.clone(),
            })
            .collect(),
    };
    let tbs_der = explicit.to_der().unwrap();

    let signed = SignedCertificate {
        tbs_certificate: Any::from_der(&tbs_der).unwrap(),
        signature_algorithm: ecdsa_with_sha256(),
        signature: sign(&issuer.key, &tbs_der),
    };
    let der = signed.to_der().unwrap();

    let cert = Certificate::from_der(&der).unwrap();
    assert_ne!(cert.to_der().unwrap(), der);
    TestAuthority {
        cert,
        key: template.key,
        der,
    }
}

/// The status a test responder reports.
#[derive(Debug, Clone, Copy)]
pub enum ReplyStatus {
    Good,
    Revoked,
    Unknown,
}

/// How a test responder builds its reply.
#[derive(Clone)]
pub struct Reply {
    pub status: ReplyStatus,
    pub this_update: SystemTime,
    pub next_update: Option<SystemTime>,
    pub echo_nonce: bool,
    /// Overrides the CertID taken from the request.
    pub cert_id: Option<CertId>,
    /// Delegated responder certificate to embed.
    pub include_signer: bool,
    /// Encode the DEFAULT `version [0] v1` in `ResponseData`.
    pub explicit_version: bool,
}

impl Reply {
    pub fn new(status: ReplyStatus) -> Self {
        Reply {
            status,
            this_update: SystemTime::now() - Duration::from_secs(5),
            next_update: None,
            echo_nonce: true,
            cert_id: None,
            include_signer: false,
            explicit_version: false,
        }
    }
}

/// The nonce carried by a request, if any.
pub fn request_nonce(request: &OcspRequest) -> Option<Vec<u8>> {
    let ext = request
        .tbs_request
        .request_extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == ID_PKIX_OCSP_NONCE)?;
    let inner = OctetString::from_der(ext.extn_value.as_bytes()).ok()?;
    Some(inner.as_bytes().to_vec())
}

/// Builds a signed successful OCSP response answering `request`.
pub fn signed_reply(request: &OcspRequest, signer: &TestAuthority, reply: &Reply) -> Vec<u8> {
    let cert_id = reply
        .cert_id
        .clone()
        .unwrap_or_else(|| request.tbs_request.request_list[0].req_cert.clone());

    let cert_status = match reply.status {
        ReplyStatus::Good => CertStatus::Good(Null),
        ReplyStatus::Revoked => CertStatus::Revoked(RevokedInfo {
            revocation_time: generalized(SystemTime::now() - Duration::from_secs(3600)),
            revocation_reason: Some(CrlReason::KeyCompromise),
        }),
        ReplyStatus::Unknown => CertStatus::Unknown(Null),
    };

    let response_extensions = if reply.echo_nonce {
        request_nonce(request).map(|nonce| vec![nonce_extension(&nonce).unwrap()])
    } else {
        None
    };

    let tbs_response_data = ResponseData {
        version: Version::V1,
        responder_id: ResponderId::ByName(signer.cert.inner.tbs_certificate.subject.clone()),
        produced_at: generalized(SystemTime::now()),
        responses: vec![SingleResponse {
            cert_id,
            cert_status,
            this_update: generalized(reply.this_update),
            next_update: reply.next_update.map(generalized),
            single_extensions: None,
        }],
        response_extensions,
    };

    let mut tbs_response_data = Any::from_der(&tbs_response_data.to_der().unwrap()).unwrap();
    if reply.explicit_version {
        let mut value = vec![0xa0, 0x03, 0x02, 0x01, 0x00];
        value.extend_from_slice(tbs_response_data.value());
        tbs_response_data = Any::new(Tag::Sequence, value).unwrap();
    }

    let signature = sign(&signer.key, &tbs_response_data.to_der().unwrap());
    let basic = BasicOcspResponse {
        tbs_response_data,
        signature_algorithm: ecdsa_with_sha256(),
        signature,
        certs: reply
            .include_signer
            .then(|| vec![SignedCertificate::from_der(&signer.der).unwrap()]),
    };

    OcspResponse {
        response_status: OcspResponseStatus::Successful,
        response_bytes: Some(ResponseBytes {
            response_type: ID_PKIX_OCSP_BASIC,
            response: OctetString::new(basic.to_der().unwrap()).unwrap(),
        }),
    }
    .to_der()
    .unwrap()
}

/// An unsuccessful response carrying only a status.
pub fn status_only_reply(status: OcspResponseStatus) -> Vec<u8> {
    OcspResponse {
        response_status: status,
        response_bytes: None,
    }
    .to_der()
    .unwrap()
}

async fn read_request_body(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before request headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before request body");
        buf.extend_from_slice(&chunk[..n]);
    }

    buf[header_end..header_end + content_length].to_vec()
}

async fn write_response(socket: &mut TcpStream, status_line: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/ocsp-response\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    socket.write_all(head.as_bytes()).await.unwrap();
    socket.write_all(body).await.unwrap();
    let _ = socket.shutdown().await;
}

/// Serves OCSP over HTTP on localhost; `handler` turns each decoded request into a DER reply.
pub async fn spawn_responder<F>(handler: F) -> String
where
    F: Fn(OcspRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let body = read_request_body(&mut socket).await;
                let request = OcspRequest::from_der(&body).unwrap();
                let reply = handler(request);
                write_response(&mut socket, "200 OK", &reply).await;
            });
        }
    });

    format!("http://{addr}/ocsp")
}

/// Answers every request with a fixed HTTP status and body.
pub async fn spawn_fixed_responder(status_line: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let _ = read_request_body(&mut socket).await;
                write_response(&mut socket, status_line, &body).await;
            });
        }
    });

    format!("http://{addr}/ocsp")
}

/// Accepts connections and never answers.
pub async fn spawn_silent_responder() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/ocsp")
}
