//! Desired state of one managed certificate
//!
//! A [`Descriptor`] is built once from raw [`DescriptorParams`], validated, and
//! never mutated afterwards. Default key and template locations are derived
//! from the certificate path at construction time.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CertError, CertResult};

/// Validity period applied when none is configured.
pub const DEFAULT_DAYS: u32 = 3650;

/// Key algorithm of the private key backing the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Rsa,
    Dsa,
}

impl FromStr for Algorithm {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            "dsa" => Ok(Self::Dsa),
            _ => Err(CertError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("rsa"),
            Self::Dsa => f.write_str("dsa"),
        }
    }
}

/// Private key passphrase. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Raw, unvalidated parameter values as supplied by the manifest.
///
/// Field names follow the user-facing parameter names.
#[derive(Debug, Clone, Default)]
pub struct DescriptorParams {
    pub path: String,
    pub private_key: Option<String>,
    pub template: Option<String>,
    pub authority_cnf: Option<String>,
    pub request: Option<String>,
    pub days: Option<String>,
    pub authentication: Option<String>,
    pub password: Option<Secret>,
    pub force: bool,
    pub req_ext: bool,
    pub ca: bool,
    pub server_only: bool,
    pub client_only: bool,
}

impl DescriptorParams {
    /// Parameters for `path` with every other value left at its default.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Validated, immutable desired state for one certificate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    path: PathBuf,
    private_key_path: PathBuf,
    template_path: PathBuf,
    authority_config_path: Option<PathBuf>,
    request_path: Option<PathBuf>,
    days: u32,
    algorithm: Algorithm,
    password: Option<Secret>,
    force: bool,
    include_subject_alt_name_extension: bool,
    is_authority: bool,
    server_only: bool,
    client_only: bool,
}

impl Descriptor {
    /// Validate `params` and compute derived defaults.
    pub fn new(params: DescriptorParams) -> CertResult<Self> {
        let path = absolute_path("path", &params.path)?;
        if path.file_name().is_none() {
            return Err(CertError::validation(
                "path",
                format!("path must name a file: {}", params.path),
            ));
        }

        let private_key_path = match params.private_key.as_deref() {
            Some(raw) => absolute_path("private_key", raw)?,
            None => path.with_extension("key"),
        };
        let template_path = match params.template.as_deref() {
            Some(raw) => absolute_path("template", raw)?,
            None => path.with_extension("cnf"),
        };
        let authority_config_path = params
            .authority_cnf
            .as_deref()
            .map(|raw| absolute_path("authority_cnf", raw))
            .transpose()?;
        let request_path = params
            .request
            .as_deref()
            .map(|raw| absolute_path("request", raw))
            .transpose()?;

        let days = match params.days.as_deref() {
            Some(raw) => parse_days(raw)?,
            None => DEFAULT_DAYS,
        };

        let algorithm = match params.authentication.as_deref() {
            Some(raw) => raw
                .parse::<Algorithm>()
                .map_err(|e| CertError::validation("authentication", e.to_string()))?,
            None => Algorithm::default(),
        };

        Ok(Self {
            path,
            private_key_path,
            template_path,
            authority_config_path,
            request_path,
            days,
            algorithm,
            password: params.password,
            force: params.force,
            include_subject_alt_name_extension: params.req_ext,
            is_authority: params.ca,
            server_only: params.server_only,
            client_only: params.client_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn authority_config_path(&self) -> Option<&Path> {
        self.authority_config_path.as_deref()
    }

    /// Presence of a request switches creation to CA-signing mode.
    pub fn request_path(&self) -> Option<&Path> {
        self.request_path.as_deref()
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn password(&self) -> Option<&Secret> {
        self.password.as_ref()
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn include_subject_alt_name_extension(&self) -> bool {
        self.include_subject_alt_name_extension
    }

    pub fn is_authority(&self) -> bool {
        self.is_authority
    }

    pub fn server_only(&self) -> bool {
        self.server_only
    }

    pub fn client_only(&self) -> bool {
        self.client_only
    }

    /// Files that must be in place before this certificate can be generated.
    pub fn requirements(&self) -> [&Path; 2] {
        [&self.private_key_path, &self.template_path]
    }
}

fn absolute_path(field: &'static str, raw: &str) -> CertResult<PathBuf> {
    if raw.is_empty() {
        return Err(CertError::validation(field, "path must not be empty"));
    }
    let path = PathBuf::from(raw);
    if !path.is_absolute() {
        return Err(CertError::validation(
            field,
            format!("path must be absolute: {raw}"),
        ));
    }
    Ok(path)
}

fn parse_days(raw: &str) -> CertResult<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CertError::validation(
            "days",
            format!("expected a non-negative integer, got '{raw}'"),
        ));
    }
    raw.parse::<u32>()
        .map_err(|e| CertError::validation("days", format!("'{raw}' is out of range: {e}")))
}
