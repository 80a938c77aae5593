//! Error taxonomy for certificate reconciliation.
//!
//! Every failure is surfaced to the caller; nothing in this crate catches and
//! suppresses a `CertError`.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type CertResult<T> = Result<T, CertError>;

#[derive(Debug, Error)]
pub enum CertError {
    /// A raw parameter failed validation while building a descriptor.
    #[error("invalid parameter `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("unsupported key algorithm '{0}' (expected 'rsa' or 'dsa')")]
    UnsupportedAlgorithm(String),

    /// The private key could not be read or decrypted.
    #[error("failed to load private key {}: {message}", path.display())]
    KeyLoad { path: PathBuf, message: String },

    #[error("failed to parse certificate {}: {message}", path.display())]
    CertificateParse { path: PathBuf, message: String },

    #[error("failed to parse template {} at line {line}: {message}", path.display())]
    TemplateParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no such file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The external tool could not be started at all.
    #[error("failed to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran and exited unsuccessfully.
    #[error("{program} exited with {}: {}", describe_exit(*code), stderr.trim())]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl CertError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Map an I/O error on `path` onto the not-found / permission / generic split.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}
