use const_oid::ObjectIdentifier;
use der::Encode;
use ecdsa::signature::hazmat::PrehashVerifier;
use pkcs8::DecodePublicKey;
use rsa::signature::Verifier as RsaVerifier;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::IdCardError;

const SHA_1_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA_384_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA_512_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP_256_R_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP_384_R_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Digest used by a signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Represents the signature algorithms accepted on OCSP responses and
/// responder certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSA PKCS #1 v1.5 with the given digest.
    RsaPkcs1v15(HashAlgorithm),
    /// ECDSA with the given digest.
    Ecdsa(HashAlgorithm),
    /// Ed25519 (pure EdDSA).
    Ed25519,
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = IdCardError;

    /// Maps a signature `AlgorithmIdentifier` to a supported algorithm.
    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self, Self::Error> {
        let algorithm = match value.oid {
            SHA_1_WITH_RSA_ENCRYPTION => SignatureAlgorithm::RsaPkcs1v15(HashAlgorithm::Sha1),
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                SignatureAlgorithm::RsaPkcs1v15(HashAlgorithm::Sha256)
            }
            SHA_384_WITH_RSA_ENCRYPTION => {
                SignatureAlgorithm::RsaPkcs1v15(HashAlgorithm::Sha384)
            }
            SHA_512_WITH_RSA_ENCRYPTION => {
                SignatureAlgorithm::RsaPkcs1v15(HashAlgorithm::Sha512)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => {
                SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha256)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => {
                SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha384)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_512 => {
                SignatureAlgorithm::Ecdsa(HashAlgorithm::Sha512)
            }
            const_oid::db::rfc8410::ID_ED_25519 => SignatureAlgorithm::Ed25519,
            other => {
                return Err(IdCardError::SignatureError(format!(
                    "unsupported signature algorithm {other}"
                )));
            }
        };
        Ok(algorithm)
    }
}

/// Verifies `signature` over `message` with the key in `spki`.
///
/// # Arguments
/// * `spki` - The signer's subject public key info.
/// * `algorithm` - The signature algorithm identifier carried next to the signature.
/// * `message` - The signed bytes (DER of the to-be-signed structure).
/// * `signature` - The raw signature bytes (DER `ECDSA-Sig-Value` for ECDSA).
pub fn verify(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: &AlgorithmIdentifierOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<(), IdCardError> {
    let algorithm = SignatureAlgorithm::try_from(algorithm)?;
    let spki_der = spki.to_der()?;

    match algorithm {
        SignatureAlgorithm::RsaPkcs1v15(hash) => {
            if spki.algorithm.oid != RSA_ENCRYPTION {
                return Err(key_mismatch(&spki.algorithm.oid, "RSA"));
            }
            let public_key = rsa::RsaPublicKey::from_public_key_der(&spki_der)
                .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
            verify_rsa(public_key, hash, message, signature)
        }
        SignatureAlgorithm::Ecdsa(hash) => {
            if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
                return Err(key_mismatch(&spki.algorithm.oid, "EC"));
            }
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.decode_as::<ObjectIdentifier>().ok());
            let prehash = hash.digest(message);

            match curve {
                Some(SECP_256_R_1) => {
                    let key = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
                        .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
                    let sig = p256::ecdsa::Signature::from_der(signature)
                        .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
                    key.verify_prehash(&prehash, &sig)
                        .map_err(|_| bad_signature())
                }
                Some(SECP_384_R_1) => {
                    let key = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
                        .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
                    let sig = p384::ecdsa::Signature::from_der(signature)
                        .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
                    key.verify_prehash(&prehash, &sig)
                        .map_err(|_| bad_signature())
                }
                other => Err(IdCardError::SignatureError(format!(
                    "unsupported elliptic curve {other:?}"
                ))),
            }
        }
        SignatureAlgorithm::Ed25519 => {
            let key = ed25519_dalek::VerifyingKey::from_public_key_der(&spki_der)
                .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
            let sig = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|e| IdCardError::SignatureError(e.to_string()))?;
            ed25519_dalek::Verifier::verify(&key, message, &sig).map_err(|_| bad_signature())
        }
    }
}

fn verify_rsa(
    public_key: rsa::RsaPublicKey,
    hash: HashAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<(), IdCardError> {
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| IdCardError::SignatureError(e.to_string()))?;

    let result = match hash {
        HashAlgorithm::Sha1 => {
            rsa::pkcs1v15::VerifyingKey::<Sha1>::new(public_key).verify(message, &sig)
        }
        HashAlgorithm::Sha256 => {
            rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key).verify(message, &sig)
        }
        HashAlgorithm::Sha384 => {
            rsa::pkcs1v15::VerifyingKey::<Sha384>::new(public_key).verify(message, &sig)
        }
        HashAlgorithm::Sha512 => {
            rsa::pkcs1v15::VerifyingKey::<Sha512>::new(public_key).verify(message, &sig)
        }
    };
    result.map_err(|_| bad_signature())
}

fn key_mismatch(key_oid: &ObjectIdentifier, expected: &str) -> IdCardError {
    IdCardError::SignatureError(format!(
        "signature algorithm needs an {expected} key, signer key is {key_oid}"
    ))
}

fn bad_signature() -> IdCardError {
    IdCardError::SignatureError("signature verification failed".to_string())
}
