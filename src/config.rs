//! ID-card authentication configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::IdCardError;

/// Top-level ID-card configuration.
///
/// # Fields
/// * `ocsp` - Revocation checking settings.
/// * `issuer_certificates` - PEM files with the trusted issuer certificates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct IdCardConfig {
    #[serde(default)]
    #[builder(default)]
    pub ocsp: OcspConfig,

    #[serde(default)]
    #[builder(default)]
    pub issuer_certificates: Vec<PathBuf>,
}

/// OCSP settings.
///
/// # Fields
/// * `enabled` - Whether certificates are checked for revocation at all.
/// * `url` - Responder URL. When unset, the certificate's AIA OCSP location is used.
/// * `timeout_ms` - Deadline for one request/response exchange.
/// * `accepted_clock_skew_secs` - Tolerated clock difference to the responder.
/// * `response_lifetime_secs` - Maximum age of a response's `thisUpdate`.
/// * `nonce` - Send a request nonce and require it to be echoed.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct OcspConfig {
    #[serde(default)]
    #[builder(default)]
    pub enabled: bool,

    #[serde(default)]
    #[builder(into)]
    pub url: Option<String>,

    #[serde(default = "default_timeout_ms")]
    #[builder(default = default_timeout_ms())]
    pub timeout_ms: u64,

    #[serde(default = "default_clock_skew_secs")]
    #[builder(default = default_clock_skew_secs())]
    pub accepted_clock_skew_secs: u64,

    #[serde(default = "default_response_lifetime_secs")]
    #[builder(default = default_response_lifetime_secs())]
    pub response_lifetime_secs: u64,

    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub nonce: bool,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_clock_skew_secs() -> u64 {
    120
}

fn default_response_lifetime_secs() -> u64 {
    900
}

fn default_true() -> bool {
    true
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout_ms: default_timeout_ms(),
            accepted_clock_skew_secs: default_clock_skew_secs(),
            response_lifetime_secs: default_response_lifetime_secs(),
            nonce: true,
        }
    }
}

impl OcspConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn accepted_clock_skew(&self) -> Duration {
        Duration::from_secs(self.accepted_clock_skew_secs)
    }

    pub fn response_lifetime(&self) -> Duration {
        Duration::from_secs(self.response_lifetime_secs)
    }
}

impl IdCardConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, IdCardError> {
        let config: IdCardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IdCardError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IdCardError::IoError(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), IdCardError> {
        if !self.ocsp.enabled {
            return Ok(());
        }

        if self.issuer_certificates.is_empty() {
            return Err(IdCardError::ConfigError(
                "OCSP is enabled but no issuer certificates are configured".to_string(),
            ));
        }

        if self.ocsp.timeout_ms == 0 {
            return Err(IdCardError::ConfigError(
                "OCSP timeout must be greater than zero".to_string(),
            ));
        }

        match &self.ocsp.url {
            Some(url) => {
                let parsed = reqwest::Url::parse(url)
                    .map_err(|e| IdCardError::ConfigError(format!("invalid OCSP URL {url}: {e}")))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(IdCardError::ConfigError(format!(
                        "OCSP URL must use http or https: {url}"
                    )));
                }
            }
            None => {
                tracing::warn!("OCSP enabled without a responder URL, relying on certificate AIA");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IdCardConfig::default();
        assert!(!config.ocsp.enabled);
        assert!(config.ocsp.nonce);
        assert_eq!(config.ocsp.timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_config() {
        let config = IdCardConfig::from_json(
            r#"{
                "ocsp": {
                    "enabled": true,
                    "url": "http://aia.sk.ee/esteid2018",
                    "timeout-ms": 3000
                },
                "issuer-certificates": ["/etc/idcard/esteid2018.pem"]
            }"#,
        )
        .unwrap();

        assert!(config.ocsp.enabled);
        assert_eq!(config.ocsp.url.as_deref(), Some("http://aia.sk.ee/esteid2018"));
        assert_eq!(config.ocsp.timeout(), Duration::from_secs(3));
        assert_eq!(config.ocsp.response_lifetime(), Duration::from_secs(900));
        assert_eq!(config.issuer_certificates.len(), 1);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(IdCardConfig::from_json(r#"{ "ocsp-enabled": true }"#).is_err());
    }

    #[test]
    fn test_enabled_ocsp_requires_issuers() {
        let config = IdCardConfig::builder()
            .ocsp(OcspConfig::builder().enabled(true).url("http://localhost/ocsp").build())
            .build();
        assert!(matches!(config.validate(), Err(IdCardError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = IdCardConfig::builder()
            .ocsp(OcspConfig::builder().enabled(true).url("ldap://example").build())
            .issuer_certificates(vec![PathBuf::from("issuer.pem")])
            .build();
        assert!(config.validate().is_err());

        let config = IdCardConfig::builder()
            .ocsp(OcspConfig::builder().enabled(true).url("not a url").build())
            .issuer_certificates(vec![PathBuf::from("issuer.pem")])
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = IdCardConfig::builder()
            .ocsp(OcspConfig::builder().enabled(true).timeout_ms(0).build())
            .issuer_certificates(vec![PathBuf::from("issuer.pem")])
            .build();
        assert!(config.validate().is_err());
    }
}
