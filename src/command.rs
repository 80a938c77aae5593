//! `openssl` invocation building
//!
//! Arguments are collected as typed tokens and only turned into strings at
//! the process boundary. The passphrase is still handed to the tool as a
//! `-passin pass:<secret>` argument, which makes it visible in process
//! listings; `Display` redacts it so it never reaches the logs.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::descriptor::{Descriptor, Secret};

/// Extension section selected when SANs are taken from the template.
pub const SAN_EXTENSION_SECTION: &str = "req_ext";

/// Extension profile appended after the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionProfile {
    ServerAndClient,
    ClientAuth,
    ServerAuth,
}

impl ExtensionProfile {
    /// Both flags win over either flag alone; neither flag selects nothing.
    pub fn select(server_only: bool, client_only: bool) -> Option<Self> {
        match (server_only, client_only) {
            (true, true) => Some(Self::ServerAndClient),
            (false, true) => Some(Self::ClientAuth),
            (true, false) => Some(Self::ServerAuth),
            (false, false) => None,
        }
    }

    /// Section name in the template providing the profile.
    pub fn section(self) -> &'static str {
        match self {
            Self::ServerAndClient => "ssl_both",
            Self::ClientAuth => "clientAuth",
            Self::ServerAuth => "serverAuth",
        }
    }
}

/// One token of the argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Leading subcommand, e.g. `req`.
    Subcommand(&'static str),
    /// Bare flag, e.g. `-batch`.
    Flag(&'static str),
    /// Flag followed by a path.
    Path(&'static str, PathBuf),
    /// Flag followed by plain text.
    Value(&'static str, String),
    /// Flag followed by `pass:<secret>`.
    Passphrase(&'static str, Secret),
}

impl Arg {
    fn push_os(&self, out: &mut Vec<OsString>) {
        match self {
            Self::Subcommand(name) | Self::Flag(name) => out.push(name.into()),
            Self::Path(flag, path) => {
                out.push(flag.into());
                out.push(path.as_os_str().to_owned());
            }
            Self::Value(flag, value) => {
                out.push(flag.into());
                out.push(value.into());
            }
            Self::Passphrase(flag, secret) => {
                out.push(flag.into());
                out.push(format!("pass:{}", secret.expose()).into());
            }
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subcommand(name) | Self::Flag(name) => f.write_str(name),
            Self::Path(flag, path) => write!(f, "{flag} {}", path.display()),
            Self::Value(flag, value) => write!(f, "{flag} {value}"),
            Self::Passphrase(flag, _) => write!(f, "{flag} pass:****"),
        }
    }
}

/// Ordered argument list for one run of the certificate tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    args: Vec<Arg>,
}

impl Invocation {
    fn push(&mut self, arg: Arg) -> &mut Self {
        self.args.push(arg);
        self
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Arguments as handed to the process.
    pub fn to_os_args(&self) -> Vec<OsString> {
        let mut out = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            arg.push_os(&mut out);
        }
        out
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

/// Build the `openssl` arguments that produce the certificate for `descriptor`.
///
/// With a request configured the request is signed by a CA (`openssl ca`);
/// otherwise a new request or self-signed certificate is generated from the
/// private key and template (`openssl req`).
pub fn build_invocation(descriptor: &Descriptor) -> Invocation {
    let mut inv = Invocation::default();

    match descriptor.request_path() {
        Some(request) => sign_request(&mut inv, request, descriptor.authority_config_path()),
        None => generate_request(&mut inv, descriptor),
    }

    inv.push(Arg::Path("-out", descriptor.path().to_path_buf()));

    if let Some(profile) =
        ExtensionProfile::select(descriptor.server_only(), descriptor.client_only())
    {
        inv.push(Arg::Value("-extensions", profile.section().to_string()));
    }
    inv
}

fn sign_request(inv: &mut Invocation, request: &Path, authority_cnf: Option<&Path>) {
    inv.push(Arg::Subcommand("ca"))
        .push(Arg::Flag("-create_serial"))
        .push(Arg::Flag("-batch"))
        .push(Arg::Path("-in", request.to_path_buf()));
    if let Some(cnf) = authority_cnf {
        inv.push(Arg::Path("-config", cnf.to_path_buf()));
    }
}

fn generate_request(inv: &mut Invocation, descriptor: &Descriptor) {
    inv.push(Arg::Subcommand("req"))
        .push(Arg::Flag("-new"))
        .push(Arg::Path("-key", descriptor.private_key_path().to_path_buf()));

    if descriptor.is_authority() {
        inv.push(Arg::Flag("-x509"));
    }

    inv.push(Arg::Path("-config", descriptor.template_path().to_path_buf()))
        .push(Arg::Value("-days", descriptor.days().to_string()));

    match descriptor.password() {
        Some(secret) => inv.push(Arg::Passphrase("-passin", secret.clone())),
        None => inv.push(Arg::Flag("-nodes")),
    };

    if descriptor.include_subject_alt_name_extension() {
        inv.push(Arg::Value("-extensions", SAN_EXTENSION_SECTION.to_string()));
    }
}
