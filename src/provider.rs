//! Resource operations over a [`Descriptor`]
//!
//! The provider is what a reconciliation loop talks to: `exists`, `create`,
//! `destroy`, `refresh`, and `reconcile`, which picks among them according
//! to the desired [`Ensure`] state.

use std::fmt;
use std::fs;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::command::build_invocation;
use crate::descriptor::Descriptor;
use crate::error::{CertError, CertResult};
use crate::evaluator::{self, CertificateState, Mismatch};
use crate::runner::{CommandRunner, OpensslRunner, ProcessOutput};

/// Whether the certificate should be present or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// What `reconcile` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Created,
    Regenerated(Mismatch),
    Removed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::Created => f.write_str("created"),
            Self::Regenerated(why) => write!(f, "regenerated ({why})"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Provider<R = OpensslRunner> {
    runner: R,
}

impl Provider<OpensslRunner> {
    /// Provider backed by `openssl` from `PATH`.
    pub fn openssl() -> Self {
        Self::new(OpensslRunner::from_path())
    }
}

impl<R: CommandRunner> Provider<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn state(&self, descriptor: &Descriptor) -> CertResult<CertificateState> {
        evaluator::needs_action(descriptor)
    }

    pub fn exists(&self, descriptor: &Descriptor) -> CertResult<bool> {
        evaluator::exists(descriptor)
    }

    /// Generate (or overwrite) the certificate.
    pub fn create(&self, descriptor: &Descriptor) -> CertResult<ProcessOutput> {
        for required in descriptor.requirements() {
            if !required.exists() {
                warn!(
                    "{} requires {}, which does not exist",
                    descriptor.path().display(),
                    required.display()
                );
            }
        }
        let invocation = build_invocation(descriptor);
        self.runner.run(&invocation)
    }

    /// Remove the certificate file.
    pub fn destroy(&self, descriptor: &Descriptor) -> CertResult<()> {
        let path = descriptor.path();
        fs::remove_file(path).map_err(|e| CertError::from_io(path, e))?;
        info!("Removed {}", path.display());
        Ok(())
    }

    /// Refresh notification: regenerate unconditionally.
    pub fn refresh(&self, descriptor: &Descriptor) -> CertResult<ProcessOutput> {
        self.create(descriptor)
    }

    /// Bring the file at `descriptor.path()` to the `ensure` state.
    pub fn reconcile(&self, descriptor: &Descriptor, ensure: Ensure) -> CertResult<Outcome> {
        let path = descriptor.path();
        match ensure {
            Ensure::Present => match self.state(descriptor)? {
                CertificateState::Conforming => Ok(Outcome::Unchanged),
                CertificateState::Absent => {
                    info!("{} is missing, generating", path.display());
                    self.create(descriptor)?;
                    Ok(Outcome::Created)
                }
                CertificateState::NonConforming(why) => {
                    info!("{} does not conform: {why}; regenerating", path.display());
                    self.create(descriptor)?;
                    Ok(Outcome::Regenerated(why))
                }
            },
            Ensure::Absent if path.exists() => {
                self.destroy(descriptor)?;
                Ok(Outcome::Removed)
            }
            Ensure::Absent => Ok(Outcome::Unchanged),
        }
    }
}
