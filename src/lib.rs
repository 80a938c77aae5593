//! Declarative management of X.509 certificate files
//!
//! A [`Descriptor`] states what a certificate should look like. The
//! [`evaluator`] decides whether the file on disk already satisfies it, the
//! [`command`] module builds the `openssl` invocation that regenerates it, and
//! the [`Provider`] ties both to a process runner for reconciliation.

pub mod command;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod evaluator;
pub mod key;
pub mod provider;
pub mod record;
pub mod runner;
pub mod template;

pub use command::{Arg, ExtensionProfile, Invocation, build_invocation};
pub use descriptor::{Algorithm, Descriptor, DescriptorParams, Secret};
pub use error::{CertError, CertResult};
pub use evaluator::{CertificateState, Mismatch, needs_action};
pub use provider::{Ensure, Outcome, Provider};
pub use runner::{CommandRunner, OpensslRunner, ProcessOutput};
