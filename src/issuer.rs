use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::cert::Certificate;
use crate::error::IdCardError;

/// The set of trusted issuer certificates, keyed by subject common name.
///
/// Built once at configuration time and shared read-only (usually behind an
/// `Arc`) by every verification call.
#[derive(Debug, Clone, Default)]
pub struct IssuerStore {
    issuers: HashMap<String, Certificate>,
}

impl IssuerStore {
    /// Builds a store from trusted issuer certificates.
    ///
    /// # Arguments
    /// * `certificates` - Issuer certificates; each must carry a subject CN.
    ///
    /// # Returns
    /// An error if a certificate has no common name or two certificates share one.
    pub fn from_certificates(
        certificates: impl IntoIterator<Item = Certificate>,
    ) -> Result<Self, IdCardError> {
        let mut issuers = HashMap::new();

        for certificate in certificates {
            let common_name = certificate.subject_common_name()?.ok_or_else(|| {
                IdCardError::ConfigError(format!(
                    "issuer certificate {} has no common name",
                    certificate.serial_hex()
                ))
            })?;

            if issuers.contains_key(&common_name) {
                return Err(IdCardError::ConfigError(format!(
                    "duplicate issuer common name: {common_name}"
                )));
            }

            debug!(issuer = %common_name, "Trusted issuer registered");
            issuers.insert(common_name, certificate);
        }

        Ok(IssuerStore { issuers })
    }

    /// Loads issuer certificates from PEM files. A file may hold several certificates.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, IdCardError> {
        let mut certificates = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let bundle = std::fs::read_to_string(path)
                .map_err(|e| IdCardError::IoError(format!("{}: {e}", path.display())))?;
            certificates.extend(Certificate::bundle_from_pem(&bundle)?);
        }

        let store = Self::from_certificates(certificates)?;
        info!(count = store.len(), "Loaded trusted issuer certificates");
        Ok(store)
    }

    /// Looks up a trusted issuer by common name.
    pub fn get(&self, common_name: &str) -> Option<&Certificate> {
        self.issuers.get(common_name)
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }

    /// Common names of the trusted issuers.
    pub fn common_names(&self) -> impl Iterator<Item = &str> {
        self.issuers.keys().map(String::as_str)
    }
}

/// Finds the trusted issuer of `certificate`.
///
/// The lookup key is the issuer common name the certificate claims. `None`
/// means the issuer is not trusted (or the claim is unreadable); callers must
/// fail verification rather than skip revocation checking.
pub fn resolve<'a>(certificate: &Certificate, store: &'a IssuerStore) -> Option<&'a Certificate> {
    let issuer_cn = match certificate.issuer_common_name() {
        Ok(Some(cn)) => cn,
        Ok(None) => {
            debug!(serial = %certificate.serial_hex(), "Certificate issuer has no common name");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "Certificate issuer name could not be decoded");
            return None;
        }
    };

    debug!(issuer = %issuer_cn, "Issuer CN extracted");
    store.get(&issuer_cn)
}
