use std::fmt;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::{Tag, Tagged};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use crate::error::IdCardError;

/// Common name (CN).
pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
/// Surname (SURNAME).
pub const SURNAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.4");
/// Serial number (SERIALNUMBER), carries the personal identification code.
pub const SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");
/// Country (C).
pub const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
/// Locality (L).
pub const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
/// State or province (ST).
pub const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
/// Organization (O).
pub const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
/// Organizational unit (OU).
pub const ORGANIZATION_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
/// Given name (GIVENNAME).
pub const GIVEN_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.42");
/// PKCS #9 e-mail address (EMAILADDRESS).
pub const EMAIL_ADDRESS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

const SHORT_NAMES: &[(ObjectIdentifier, &str)] = &[
    (COMMON_NAME, "CN"),
    (SURNAME, "SURNAME"),
    (SERIAL_NUMBER, "SERIALNUMBER"),
    (COUNTRY, "C"),
    (LOCALITY, "L"),
    (STATE, "ST"),
    (ORGANIZATION, "O"),
    (ORGANIZATION_UNIT, "OU"),
    (GIVEN_NAME, "GIVENNAME"),
    (EMAIL_ADDRESS, "EMAILADDRESS"),
];

/// Returns the short attribute name for a known attribute type OID.
pub fn short_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    SHORT_NAMES
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| *name)
}

/// Returns the attribute type OID for a short attribute name.
pub fn attribute_oid(name: &str) -> Option<ObjectIdentifier> {
    SHORT_NAMES
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(name))
        .map(|(oid, _)| *oid)
}

/// A single `KEY=value` attribute of a distinguished name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameAttribute {
    /// Short name (`CN`, `SERIALNUMBER`, ...) or dotted OID for unknown types.
    pub key: String,
    pub value: String,
}

/// An ordered distinguished name.
///
/// Attributes keep the order in which they are encoded in the certificate
/// (or written in the parsed string). Duplicate keys are kept; lookups return
/// the first match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub attributes: Vec<NameAttribute>,
}

impl DistinguishedName {
    /// Creates a distinguished name from `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        DistinguishedName {
            attributes: pairs
                .into_iter()
                .map(|(key, value)| NameAttribute {
                    key: key.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Returns the value of the first attribute whose key matches `key`
    /// (ASCII case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key.eq_ignore_ascii_case(key))
            .map(|attr| attr.value.as_str())
    }

    /// Returns the common name, if present.
    pub fn common_name(&self) -> Option<&str> {
        self.get("CN")
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// # Arguments
    /// * `x509dn` - An `x509_cert::name::DistinguishedName` object.
    ///
    /// # Returns
    /// The decoded name, or an error if an attribute value is not a string type.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self, IdCardError> {
        let mut attributes = Vec::new();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let key = short_name(&attr.oid)
                    .map(str::to_string)
                    .unwrap_or_else(|| attr.oid.to_string());
                let value = decode_attribute_value(&attr.value).map_err(|e| {
                    IdCardError::CertificateError(format!("attribute {key}: {e}"))
                })?;
                attributes.push(NameAttribute { key, value });
            }
        }

        Ok(DistinguishedName { attributes })
    }

    /// Converts the distinguished name to an X.509 name, one attribute per RDN.
    ///
    /// `C` and `SERIALNUMBER` are encoded as PrintableString, everything else
    /// as UTF8String. Keys must be known short names or dotted OIDs.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName, IdCardError> {
        let mut rdns = Vec::with_capacity(self.attributes.len());

        for attr in &self.attributes {
            let oid = match attribute_oid(&attr.key) {
                Some(oid) => oid,
                None => ObjectIdentifier::new(&attr.key).map_err(|_| {
                    IdCardError::InvalidInput(format!("unknown attribute type {}", attr.key))
                })?,
            };
            let tag = if oid == COUNTRY || oid == SERIAL_NUMBER {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let value = Any::new(tag, attr.value.as_bytes().to_vec())?;
            let atv = AttributeTypeAndValue { oid, value };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }

        Ok(RdnSequence(rdns))
    }

    /// Parses a textual distinguished name such as
    /// `SERIALNUMBER=47101010033, GIVENNAME=MARI-LIIS, SURNAME=MÄNNIK`.
    ///
    /// Attributes are separated by unquoted, unescaped `,` or `+`; whitespace
    /// around keys and values is trimmed. Values may be double-quoted, in which
    /// case separators inside the quotes are part of the value. A backslash
    /// escapes the next character.
    pub fn parse(input: &str) -> Result<Self, IdCardError> {
        let mut attributes = Vec::new();

        for entry in split_unquoted(input)? {
            let (key, value) = split_key_value(&entry)?;
            attributes.push(NameAttribute { key, value });
        }

        if attributes.is_empty() {
            return Err(IdCardError::InvalidInput(
                "distinguished name is empty".to_string(),
            ));
        }

        Ok(DistinguishedName { attributes })
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if attr.value.contains([',', '+', '"', '\\', '=', ';']) {
                let escaped = attr.value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "{}=\"{}\"", attr.key, escaped)?;
            } else {
                write!(f, "{}={}", attr.key, attr.value)?;
            }
        }
        Ok(())
    }
}

/// Decodes a directory string attribute value.
fn decode_attribute_value(value: &Any) -> Result<String, IdCardError> {
    let bytes = value.value();
    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::VisibleString => String::from_utf8(bytes.to_vec())
            .map_err(|e| IdCardError::DecodingError(e.to_string())),
        // Read as Latin-1, the way issuers emit T61String in practice.
        Tag::TeletexString => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        Tag::BmpString => {
            if bytes.len() % 2 != 0 {
                return Err(IdCardError::DecodingError(
                    "BMPString has odd length".to_string(),
                ));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|e| IdCardError::DecodingError(e.to_string()))
        }
        other => Err(IdCardError::DecodingError(format!(
            "unsupported attribute value type {other}"
        ))),
    }
}

/// Splits a DN string into raw `key=value` entries, honouring quotes and escapes.
/// Escapes are kept in the entries and resolved by `split_key_value`.
fn split_unquoted(input: &str) -> Result<Vec<String>, IdCardError> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    IdCardError::InvalidInput("dangling escape in distinguished name".to_string())
                })?;
                current.push('\\');
                current.push(escaped);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' | '+' if !in_quotes => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(IdCardError::InvalidInput(
            "unterminated quote in distinguished name".to_string(),
        ));
    }
    entries.push(current);

    // A trailing separator would leave an empty last entry; any empty entry is malformed.
    if entries.len() == 1 && entries[0].trim().is_empty() {
        return Ok(Vec::new());
    }
    if let Some(empty) = entries.iter().position(|e| e.trim().is_empty()) {
        return Err(IdCardError::InvalidInput(format!(
            "empty attribute at position {empty} in distinguished name"
        )));
    }
    Ok(entries)
}

fn split_key_value(entry: &str) -> Result<(String, String), IdCardError> {
    let (key, raw_value) = entry.split_once('=').ok_or_else(|| {
        IdCardError::InvalidInput(format!("attribute without '=': {}", entry.trim()))
    })?;

    let key = key.trim();
    if key.is_empty() || key.contains(['"', '\\']) {
        return Err(IdCardError::InvalidInput(format!(
            "invalid attribute key: {key:?}"
        )));
    }

    let raw_value = raw_value.trim();
    let quoted = raw_value.len() >= 2 && raw_value.starts_with('"') && raw_value.ends_with('"');
    let raw_value = if quoted {
        &raw_value[1..raw_value.len() - 1]
    } else {
        raw_value
    };

    let mut value = String::with_capacity(raw_value.len());
    let mut chars = raw_value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => {
                return Err(IdCardError::InvalidInput(format!(
                    "stray quote in value of {key}"
                )));
            }
            _ => value.push(c),
        }
    }

    Ok((key.to_ascii_uppercase(), value))
}
