mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use x509ctl::config::{CertificateEntry, Manifest, manifest_path};
use x509ctl::{CertificateState, Ensure, OpensslRunner, Provider, build_invocation};

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn real_main() -> Result<i32> {
    let args = cli::Args::parse();
    let path = manifest_path(args.config, args.system)?;
    let manifest = Manifest::load_or_init(&path)?;
    info!("Using manifest from: {}", path.display());

    let runner = match manifest.openssl.as_deref() {
        Some(program) => OpensslRunner::new(program),
        None => OpensslRunner::from_path(),
    };
    let provider = Provider::new(runner);

    match args.sub.unwrap_or(cli::Cmd::Reconcile) {
        cli::Cmd::Reconcile => Ok(reconcile_all(&provider, &manifest)),
        cli::Cmd::Status => handle_status(&provider, &manifest),
        cli::Cmd::Create { path } => {
            let descriptor = find(&manifest, &path)?.descriptor()?;
            provider
                .create(&descriptor)
                .with_context(|| format!("Failed to create {path}"))?;
            println!("{path} created");
            Ok(0)
        }
        cli::Cmd::Destroy { path } => {
            let descriptor = find(&manifest, &path)?.descriptor()?;
            provider
                .destroy(&descriptor)
                .with_context(|| format!("Failed to remove {path}"))?;
            println!("{path} removed");
            Ok(0)
        }
        cli::Cmd::Refresh { path } => {
            let descriptor = find(&manifest, &path)?.descriptor()?;
            provider
                .refresh(&descriptor)
                .with_context(|| format!("Failed to refresh {path}"))?;
            println!("{path} refreshed");
            Ok(0)
        }
        cli::Cmd::ShowCommand { path } => {
            let descriptor = find(&manifest, &path)?.descriptor()?;
            println!(
                "{} {}",
                provider.runner().program().display(),
                build_invocation(&descriptor)
            );
            Ok(0)
        }
    }
}

fn find<'a>(manifest: &'a Manifest, path: &str) -> Result<&'a CertificateEntry> {
    manifest
        .entry(path)
        .ok_or_else(|| anyhow::anyhow!("No certificate with path {path} in manifest"))
}

/// Reconcile every entry in order; a failure is reported and the loop moves on.
fn reconcile_all(provider: &Provider, manifest: &Manifest) -> i32 {
    let mut failed = 0usize;
    for entry in &manifest.certificates {
        let result = entry
            .descriptor()
            .and_then(|descriptor| provider.reconcile(&descriptor, entry.ensure));
        match result {
            Ok(outcome) => info!("{}: {outcome}", entry.path),
            Err(e) => {
                error!("{}: {e}", entry.path);
                failed += 1;
            }
        }
    }

    info!(
        "Reconciled {} certificate(s), {failed} failed",
        manifest.certificates.len()
    );
    if failed > 0 { 1 } else { 0 }
}

/// Print each entry's state without acting; an entry that cannot be
/// evaluated is reported and counts as needing action.
fn handle_status(provider: &Provider, manifest: &Manifest) -> Result<i32> {
    let mut pending = false;
    for entry in &manifest.certificates {
        let descriptor = match entry.descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!("{}: {e}", entry.path);
                println!("{}: error ({e})", entry.path);
                pending = true;
                continue;
            }
        };
        if entry.ensure == Ensure::Absent {
            let present = descriptor.path().exists();
            println!(
                "{}: {} (ensure absent)",
                entry.path,
                if present { "present" } else { "absent" }
            );
            pending |= present;
            continue;
        }
        let state = match provider.state(&descriptor) {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to evaluate {}: {e}", entry.path);
                println!("{}: error ({e})", entry.path);
                pending = true;
                continue;
            }
        };
        match &state {
            CertificateState::Absent => println!("{}: absent", entry.path),
            CertificateState::Conforming => println!("{}: conforming", entry.path),
            CertificateState::NonConforming(why) => {
                println!("{}: non-conforming ({why})", entry.path)
            }
        }
        pending |= state.needs_action();
    }
    Ok(if pending { 1 } else { 0 })
}
