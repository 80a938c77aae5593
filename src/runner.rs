//! Process boundary for the external certificate tool

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::command::Invocation;
use crate::error::{CertError, CertResult};

/// Name of the tool looked up on `PATH`.
pub const OPENSSL: &str = "openssl";

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes an [`Invocation`] to completion.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> CertResult<ProcessOutput>;
}

/// Runs the real `openssl` binary.
#[derive(Debug, Clone)]
pub struct OpensslRunner {
    program: PathBuf,
}

impl OpensslRunner {
    /// Use an explicit binary.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolve `openssl` on `PATH`, falling back to the bare name so the
    /// launch error names the missing program.
    pub fn from_path() -> Self {
        match which::which(OPENSSL) {
            Ok(program) => {
                debug!("Using {} for certificate generation", program.display());
                Self { program }
            }
            Err(e) => {
                debug!("{OPENSSL} not found on PATH: {e}");
                Self::new(OPENSSL)
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl CommandRunner for OpensslRunner {
    fn run(&self, invocation: &Invocation) -> CertResult<ProcessOutput> {
        let program = self.program.display().to_string();
        info!("Running {program} {invocation}");

        let output = Command::new(&self.program)
            .args(invocation.to_os_args())
            .output()
            .map_err(|source| CertError::ProcessLaunch {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CertError::ProcessFailed {
                program,
                code: output.status.code(),
                stdout,
                stderr,
            });
        }
        Ok(ProcessOutput { stdout, stderr })
    }
}
