//! On-disk TOML manifest of managed certificates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::descriptor::{Descriptor, DescriptorParams, Secret};
use crate::error::CertResult;
use crate::provider::Ensure;

/// System-wide manifest location.
pub const SYSTEM_MANIFEST: &str = "/etc/x509ctl/certificates.toml";

/// Top-level manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Explicit `openssl` binary; looked up on `PATH` when unset.
    pub openssl: Option<String>,
    #[serde(default)]
    pub certificates: Vec<CertificateEntry>,
}

/// Validity given either as a TOML integer or as a string literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Days {
    Number(i64),
    Text(String),
}

impl Days {
    fn into_literal(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// One `[[certificates]]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub path: String,
    #[serde(default)]
    pub ensure: Ensure,
    pub private_key: Option<String>,
    pub template: Option<String>,
    pub authority_cnf: Option<String>,
    pub request: Option<String>,
    pub days: Option<Days>,
    pub authentication: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub req_ext: bool,
    #[serde(default)]
    pub ca: bool,
    #[serde(default)]
    pub server_only: bool,
    #[serde(default)]
    pub client_only: bool,
}

impl CertificateEntry {
    /// Validate the entry into a descriptor.
    pub fn descriptor(&self) -> CertResult<Descriptor> {
        Descriptor::new(DescriptorParams {
            path: self.path.clone(),
            private_key: self.private_key.clone(),
            template: self.template.clone(),
            authority_cnf: self.authority_cnf.clone(),
            request: self.request.clone(),
            days: self.days.clone().map(Days::into_literal),
            authentication: self.authentication.clone(),
            password: self.password.clone().map(Secret::new),
            force: self.force,
            req_ext: self.req_ext,
            ca: self.ca,
            server_only: self.server_only,
            client_only: self.client_only,
        })
    }
}

impl Manifest {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse manifest")
    }

    /// Load the manifest, writing an empty default first if none exists.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Manifest not found at {}, creating an empty one",
                path.display()
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create manifest directory")?;
            }
            let default_toml = toml::to_string_pretty(&Manifest::default())
                .context("Failed to serialize default manifest")?;
            fs::write(path, default_toml).context("Failed to write manifest file")?;
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Entry whose `path` equals `path`.
    pub fn entry(&self, path: &str) -> Option<&CertificateEntry> {
        self.certificates.iter().find(|entry| entry.path == path)
    }
}

/// Resolve the manifest path from the command line choices.
pub fn manifest_path(explicit: Option<String>, use_system: bool) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }
    if use_system {
        return Ok(PathBuf::from(SYSTEM_MANIFEST));
    }
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("x509ctl");
    Ok(config_dir.join("certificates.toml"))
}
