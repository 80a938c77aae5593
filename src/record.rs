//! Read-only view of a certificate already present on disk
//!
//! Only the fields the equivalence check needs are extracted: the subject,
//! rendered in OpenSSL's `/K=V/K=V` one-line form, and the `subjectAltName`
//! extension, rendered the way `openssl x509 -text` prints it.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use x509_parser::prelude::*;

use crate::error::{CertError, CertResult};

const PEM_CERTIFICATE_TAGS: [&str; 3] = ["CERTIFICATE", "X509 CERTIFICATE", "TRUSTED CERTIFICATE"];

/// Subject and SAN of an existing certificate. Recomputed on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    subject: String,
    subject_alt_name: Option<String>,
}

impl CertificateRecord {
    /// Read the certificate at `path` (PEM, or DER when no PEM armour is found).
    pub fn load(path: &Path) -> CertResult<Self> {
        let bytes = fs::read(path).map_err(|e| CertError::from_io(path, e))?;
        let der = certificate_der(path, &bytes)?;
        Self::from_der(path, &der)
    }

    /// Build a record from DER bytes; `path` is only used for error reporting.
    pub fn from_der(path: &Path, der: &[u8]) -> CertResult<Self> {
        let (_, cert) = parse_x509_certificate(der).map_err(|e| parse_error(path, e))?;

        let subject_alt_name = cert
            .subject_alternative_name()
            .map_err(|e| parse_error(path, e))?
            .map(|ext| {
                ext.value
                    .general_names
                    .iter()
                    .map(render_general_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            });

        Ok(Self {
            subject: one_line(cert.subject()),
            subject_alt_name,
        })
    }

    /// Subject in `/C=US/O=Example/CN=host` form.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Subject split on `/` into `key=value` pairs. Later duplicates win.
    pub fn subject_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        for segment in self.subject.split('/').filter(|s| !s.is_empty()) {
            let mut parts = segment.split('=');
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                attrs.insert(key.to_string(), value.to_string());
            }
        }
        attrs
    }

    pub fn common_name(&self) -> Option<String> {
        self.subject_attributes().remove("CN")
    }

    /// Raw `subjectAltName` value, e.g. `DNS:example.com, IP Address:10.0.0.1`.
    pub fn subject_alt_name(&self) -> Option<&str> {
        self.subject_alt_name.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(subject: &str, subject_alt_name: Option<&str>) -> Self {
        Self {
            subject: subject.to_string(),
            subject_alt_name: subject_alt_name.map(str::to_string),
        }
    }
}

/// Locate the certificate DER inside `bytes`.
pub(crate) fn certificate_der(path: &Path, bytes: &[u8]) -> CertResult<Vec<u8>> {
    if !bytes.windows(10).any(|w| w == b"-----BEGIN") {
        return Ok(bytes.to_vec());
    }
    let blocks = ::pem::parse_many(bytes).map_err(|e| parse_error(path, e))?;
    blocks
        .into_iter()
        .find(|block| PEM_CERTIFICATE_TAGS.iter().any(|tag| *tag == block.tag()))
        .map(|block| block.into_contents())
        .ok_or_else(|| CertError::CertificateParse {
            path: path.to_path_buf(),
            message: "no CERTIFICATE block found".to_string(),
        })
}

fn parse_error(path: &Path, e: impl std::fmt::Display) -> CertError {
    CertError::CertificateParse {
        path: PathBuf::from(path),
        message: e.to_string(),
    }
}

fn one_line(name: &X509Name<'_>) -> String {
    let mut out = String::new();
    for rdn in name.iter_rdn() {
        for attr in rdn.iter() {
            out.push('/');
            out.push_str(&short_name(attr.attr_type().to_id_string()));
            out.push('=');
            match attr.as_str() {
                Ok(value) => out.push_str(value),
                Err(_) => {
                    for byte in attr.attr_value().as_bytes() {
                        let _ = write!(out, "\\x{byte:02X}");
                    }
                }
            }
        }
    }
    out
}

fn short_name(oid: String) -> String {
    let name = match oid.as_str() {
        "2.5.4.3" => "CN",
        "2.5.4.4" => "SN",
        "2.5.4.5" => "serialNumber",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "street",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.12" => "title",
        "2.5.4.17" => "postalCode",
        "2.5.4.42" => "GN",
        "1.2.840.113549.1.9.1" => "emailAddress",
        "0.9.2342.19200300.100.1.1" => "UID",
        "0.9.2342.19200300.100.1.25" => "DC",
        _ => return oid,
    };
    name.to_string()
}

fn render_general_name(name: &GeneralName<'_>) -> String {
    match name {
        GeneralName::DNSName(dns) => format!("DNS:{dns}"),
        GeneralName::RFC822Name(email) => format!("email:{email}"),
        GeneralName::URI(uri) => format!("URI:{uri}"),
        GeneralName::IPAddress(bytes) => format!("IP Address:{}", render_ip(bytes)),
        GeneralName::DirectoryName(dn) => format!("DirName:{}", one_line(dn)),
        GeneralName::RegisteredID(oid) => format!("Registered ID:{}", oid.to_id_string()),
        GeneralName::OtherName(..) => "othername:<unsupported>".to_string(),
        _ => "<unsupported>".to_string(),
    }
}

/// IPv6 is printed as eight uncompressed upper-case groups, like OpenSSL does.
fn render_ip(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3]),
        16 => bytes
            .chunks(2)
            .map(|pair| format!("{:X}", u16::from_be_bytes([pair[0], pair[1]])))
            .collect::<Vec<_>>()
            .join(":"),
        _ => "<invalid>".to_string(),
    }
}
