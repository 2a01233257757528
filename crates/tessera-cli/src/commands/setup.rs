//! `tessera setup` — Generate a new issuer key and issuer parameters.

use clap::Args;
use std::sync::Arc;

use tessera_crypto::Blake3Engine;
use tessera_issuance::IssuanceSession;

use crate::config::TesseraConfig;
use crate::files::{write_json, IssuerKeyFile};

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Override the issuer identifier from the config.
    #[arg(long)]
    pub uidp: Option<String>,

    /// Bind issued tokens to a device key.
    #[arg(long)]
    pub device_protected: bool,
}

pub fn run(args: &SetupArgs, config: &TesseraConfig) -> anyhow::Result<()> {
    let mut setup = config.issuer.clone();
    if let Some(uidp) = &args.uidp {
        setup.uidp = uidp.clone();
    }
    setup.device_protected |= args.device_protected;

    let session = IssuanceSession::setup(Arc::new(Blake3Engine::new()), &setup)?;
    let ip = session.issuer_key_parameters();
    write_json(
        &config.files.issuer_key,
        &IssuerKeyFile::new(ip.clone(), session.private_key()),
    )?;
    tracing::info!(
        uidp = %setup.uidp,
        device_protected = setup.device_protected,
        "issuer key stored"
    );

    println!("Issuer set up!");
    println!("  UIDP:       {}", setup.uidp);
    println!("  Group:      {}", ip.desc_gq.name);
    println!("  Attributes: {}", ip.max_number_of_attributes);
    println!(
        "  Key:        {}",
        ip.g.first().map(hex::encode).unwrap_or_default()
    );
    println!("  Saved to:   {}", config.files.issuer_key.display());
    Ok(())
}
