//! Private key loading and certificate matching

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::X509;

use crate::descriptor::{Algorithm, Descriptor, Secret};
use crate::error::{CertError, CertResult};
use crate::record::certificate_der;

/// A decrypted private key, able to check itself against a certificate.
pub struct PrivateKey {
    path: PathBuf,
    algorithm: Algorithm,
    key: PKey<Private>,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("path", &self.path)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Load the key configured for `descriptor`.
pub fn load_for(descriptor: &Descriptor) -> CertResult<PrivateKey> {
    load_private_key(
        descriptor.private_key_path(),
        descriptor.algorithm(),
        descriptor.password(),
    )
}

/// Read `path` and decode it as a PEM key of the given algorithm.
///
/// Without a passphrase an encrypted key fails to load instead of prompting
/// on the terminal.
pub fn load_private_key(
    path: &Path,
    algorithm: Algorithm,
    password: Option<&Secret>,
) -> CertResult<PrivateKey> {
    let pem = fs::read(path).map_err(|e| CertError::KeyLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let key = match algorithm {
        Algorithm::Rsa => decode_rsa(&pem, password),
        Algorithm::Dsa => decode_dsa(&pem, password),
    }
    .map_err(|e| CertError::KeyLoad {
        path: path.to_path_buf(),
        message: format!("not a readable {algorithm} key or wrong passphrase: {e}"),
    })?;

    debug!("Loaded {algorithm} private key from {}", path.display());
    Ok(PrivateKey {
        path: path.to_path_buf(),
        algorithm,
        key,
    })
}

fn decode_rsa(pem: &[u8], password: Option<&Secret>) -> Result<PKey<Private>, ErrorStack> {
    let rsa = match password {
        Some(secret) => Rsa::private_key_from_pem_passphrase(pem, secret.expose().as_bytes())?,
        None => Rsa::private_key_from_pem_callback(pem, |_| Ok(0))?,
    };
    PKey::from_rsa(rsa)
}

fn decode_dsa(pem: &[u8], password: Option<&Secret>) -> Result<PKey<Private>, ErrorStack> {
    let key = match password {
        Some(secret) => PKey::private_key_from_pem_passphrase(pem, secret.expose().as_bytes())?,
        None => PKey::private_key_from_pem_callback(pem, |_| Ok(0))?,
    };
    // Any PEM key decodes here; insist on DSA.
    PKey::from_dsa(key.dsa()?)
}

impl PrivateKey {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Whether the certificate at `cert_path` carries this key's public half.
    pub fn matches_certificate(&self, cert_path: &Path) -> CertResult<bool> {
        let bytes = fs::read(cert_path).map_err(|e| CertError::from_io(cert_path, e))?;
        let der = certificate_der(cert_path, &bytes)?;
        let public = X509::from_der(&der)
            .and_then(|cert| cert.public_key())
            .map_err(|e| CertError::CertificateParse {
                path: cert_path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(self.key.public_eq(&public))
    }
}
