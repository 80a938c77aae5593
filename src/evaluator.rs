//! Existence and equivalence evaluation
//!
//! Decides whether the certificate on disk satisfies a [`Descriptor`]. The
//! comparison is policy-based rather than byte-based: serial numbers and
//! signatures may differ, only the key pairing (when forced) and the subject
//! constraint from the template are checked.

use std::fmt;

use log::debug;

use crate::descriptor::Descriptor;
use crate::error::CertResult;
use crate::key;
use crate::record::CertificateRecord;
use crate::template::{CnfFile, SectionLookup};

/// Template section carrying the SAN constraint.
pub const REQ_EXT_SECTION: &str = "req_ext";
/// Template section carrying the CN constraint.
pub const DISTINGUISHED_NAME_SECTION: &str = "req_distinguished_name";

/// Why an existing certificate does not conform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    PrivateKey,
    SubjectAltName {
        expected: String,
        actual: Option<String>,
    },
    CommonName {
        expected: String,
        actual: Option<String>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey => f.write_str("private key does not match certificate"),
            Self::SubjectAltName { expected, actual } => write!(
                f,
                "subjectAltName differs (template '{expected}', certificate '{}')",
                actual.as_deref().unwrap_or("")
            ),
            Self::CommonName { expected, actual } => write!(
                f,
                "commonName differs (template '{expected}', certificate '{}')",
                actual.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

/// Result of comparing the file on disk with the desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateState {
    /// Nothing at the certificate path.
    Absent,
    /// A certificate exists and satisfies the configuration.
    Conforming,
    /// A certificate exists but must be regenerated.
    NonConforming(Mismatch),
}

impl CertificateState {
    /// Only a conforming certificate means "no action".
    pub fn needs_action(&self) -> bool {
        !matches!(self, Self::Conforming)
    }
}

/// Evaluate `descriptor` against the filesystem.
///
/// Checks run in order and stop at the first decisive one: presence, key
/// pairing (only with `force`), then template equivalence.
pub fn needs_action(descriptor: &Descriptor) -> CertResult<CertificateState> {
    let path = descriptor.path();
    if !path.exists() {
        debug!("{} is absent", path.display());
        return Ok(CertificateState::Absent);
    }

    if descriptor.force() {
        let private_key = key::load_for(descriptor)?;
        if !private_key.matches_certificate(path)? {
            return Ok(CertificateState::NonConforming(Mismatch::PrivateKey));
        }
    }

    let record = CertificateRecord::load(path)?;
    let template = CnfFile::load(descriptor.template_path())?;
    match check_equivalence(&record, &template) {
        Some(mismatch) => Ok(CertificateState::NonConforming(mismatch)),
        None => {
            debug!("{} conforms to {}", path.display(), template.path().display());
            Ok(CertificateState::Conforming)
        }
    }
}

/// Framework-facing existence test: true only for a conforming certificate.
pub fn exists(descriptor: &Descriptor) -> CertResult<bool> {
    Ok(needs_action(descriptor)? == CertificateState::Conforming)
}

/// Compare a certificate with the template constraint.
///
/// A `req_ext.subjectAltName` constraint takes precedence; the common name is
/// consulted when that key is missing, even if a `req_ext` section exists.
/// No constraint means conforming.
pub fn check_equivalence(
    record: &CertificateRecord,
    template: &impl SectionLookup,
) -> Option<Mismatch> {
    if let Some(expected) = template
        .section(REQ_EXT_SECTION)
        .and_then(|section| section.get("subjectAltName"))
    {
        let actual = record.subject_alt_name();
        if normalize_san(expected) != normalize_san(actual.unwrap_or_default()) {
            return Some(Mismatch::SubjectAltName {
                expected: expected.clone(),
                actual: actual.map(str::to_string),
            });
        }
        return None;
    }

    let expected = template
        .section(DISTINGUISHED_NAME_SECTION)?
        .get("commonName")?;
    let actual = record.common_name();
    if actual.as_deref() != Some(expected.as_str()) {
        return Some(Mismatch::CommonName {
            expected: expected.clone(),
            actual,
        });
    }
    None
}

/// Whitespace removed, one surrounding double quote stripped at each end,
/// `IPAddress` shortened to `IP`.
pub fn normalize_san(value: &str) -> String {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.strip_prefix('"').unwrap_or(&compact);
    let compact = compact.strip_suffix('"').unwrap_or(compact);
    compact.replace("IPAddress", "IP")
}
