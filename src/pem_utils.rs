use crate::error::IdCardError;

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new())
}

/// Convert a PEM‑encoded string holding a single certificate to DER‑encoded bytes.
pub fn pem_to_der(pem_str: &str) -> Result<Vec<u8>, IdCardError> {
    let pem = pem::parse(pem_str)?;
    if pem.tag() != CERTIFICATE_LABEL {
        return Err(IdCardError::InvalidInput(format!(
            "expected a {CERTIFICATE_LABEL} PEM block, found {}",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}

/// Extract every certificate block from a PEM bundle.
///
/// Blocks with other labels (keys, parameters) are skipped. A bundle without
/// any certificate is an error.
pub fn certificate_blocks(bundle: &str) -> Result<Vec<Vec<u8>>, IdCardError> {
    let blocks: Vec<Vec<u8>> = pem::parse_many(bundle)?
        .into_iter()
        .filter(|pem| pem.tag() == CERTIFICATE_LABEL)
        .map(|pem| pem.contents().to_vec())
        .collect();

    if blocks.is_empty() {
        return Err(IdCardError::InvalidInput(
            "PEM bundle contains no certificates".to_string(),
        ));
    }
    Ok(blocks)
}
