use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "x509 certificate reconciler")]
pub struct Args {
    /// Path to the certificate manifest
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    /// Use the system-wide manifest (/etc/x509ctl/certificates.toml)
    #[arg(long, global = true, conflicts_with = "config")]
    pub system: bool,

    /// Sub‑commands (reconcile, status, etc.)
    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Reconcile every certificate in the manifest (default if no sub‑command)
    Reconcile,
    /// Report each certificate's state (Exit 0 = all conforming, 1 = action needed)
    Status,
    /// Generate the certificate at PATH unconditionally
    Create { path: String },
    /// Remove the certificate at PATH
    Destroy { path: String },
    /// Regenerate the certificate at PATH (refresh notification)
    Refresh { path: String },
    /// Print the openssl invocation for PATH with the passphrase masked
    ShowCommand { path: String },
}
