//! `tessera init` — Write a default configuration file.

use clap::Args;
use std::path::Path;

use crate::config::TesseraConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Issuer identifier to put into the `[issuer]` section.
    #[arg(long)]
    pub uidp: Option<String>,

    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    let mut config = TesseraConfig::default();
    if let Some(uidp) = &args.uidp {
        config.issuer.uidp = uidp.clone();
    }
    config.issuer.validate()?;
    config.save(config_path)?;

    tracing::info!(path = %config_path.display(), "wrote default config");
    println!("Configuration written to {}", config_path.display());
    Ok(())
}
