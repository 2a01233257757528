//! `tessera trust` — Manage the verifier's trusted issuer list.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use tessera_core::wire::{IssuerParameters, TrustedIssuerList};
use tessera_presentation::TrustedIssuerRegistry;

use crate::config::TesseraConfig;
use crate::files::{read_json, read_json_or_default, write_json};

#[derive(Args, Debug)]
pub struct TrustArgs {
    #[command(subcommand)]
    pub action: TrustAction,
}

#[derive(Subcommand, Debug)]
pub enum TrustAction {
    /// Trust an issuer; replaces an entry with the same UIDP.
    Add {
        /// Issuer parameters file; defaults to the configured path.
        #[arg(short, long)]
        issuer: Option<PathBuf>,
    },
    /// Stop trusting the issuer with this UIDP.
    Remove {
        /// Issuer identifier.
        uidp: String,
    },
    /// List trusted issuers.
    List,
}

pub fn run(args: &TrustArgs, config: &TesseraConfig) -> anyhow::Result<()> {
    let path = &config.files.trusted_issuers;
    let mut list: TrustedIssuerList = read_json_or_default(path)?;

    match &args.action {
        TrustAction::Add { issuer } => {
            let ip: IssuerParameters =
                read_json(issuer.as_ref().unwrap_or(&config.files.issuer_parameters))?;
            list.issuers.retain(|trusted| trusted.uidp != ip.uidp);
            println!("Trusted {}", String::from_utf8_lossy(&ip.uidp));
            list.issuers.push(ip);
            write_json(path, &list)?;
        }
        TrustAction::Remove { uidp } => {
            let before = list.issuers.len();
            list.issuers.retain(|trusted| trusted.uidp != uidp.as_bytes());
            if list.issuers.len() == before {
                anyhow::bail!("issuer '{}' is not trusted", uidp);
            }
            write_json(path, &list)?;
            println!("Removed {}", uidp);
        }
        TrustAction::List => {
            let registry = TrustedIssuerRegistry::from_list(&list);
            if registry.is_empty() {
                println!("No trusted issuers.");
                return Ok(());
            }
            println!("{} trusted issuer(s):", registry.count());
            for entry in registry.entries() {
                println!(
                    "  {}  group={}  attributes={}  key={}",
                    String::from_utf8_lossy(&entry.uidp),
                    entry.group_name,
                    entry.max_attributes,
                    hex::encode(&entry.generator_g0)
                );
            }
        }
    }
    Ok(())
}
