//! `tessera issue` — Run the issuance handshake and store the tokens.
//!
//! Both sides of the handshake run in this process: the issuer is resumed
//! from its key file and the prover side keeps the resulting tokens.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use tessera_core::wire::KeyAndToken;
use tessera_core::Claim;
use tessera_crypto::Blake3Engine;
use tessera_issuance::{IssuanceSession, ProverInput, ProverSession};

use crate::config::TesseraConfig;
use crate::files::{read_json, write_json, IssuerKeyFile};

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// JSON file with the claims to issue.
    #[arg(long)]
    pub claims: PathBuf,

    /// Number of tokens to issue.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Token information field, visible to verifiers.
    #[arg(long, default_value = "")]
    pub token_information: String,

    /// Prover information field, hidden from verifiers.
    #[arg(long, default_value = "")]
    pub prover_information: String,
}

pub fn run(args: &IssueArgs, config: &TesseraConfig) -> anyhow::Result<()> {
    let claims: Vec<Claim> = read_json(&args.claims)?;
    let key_file: IssuerKeyFile = read_json(&config.files.issuer_key)?;
    let engine = Arc::new(Blake3Engine::new());
    let attributes = &config.attributes;

    let mut issuer = IssuanceSession::resume(
        engine.clone(),
        &serde_json::to_string(&key_file.ip)?,
        &key_file.private_key_bytes()?,
    )?;
    issuer.configure(
        &claims,
        &attributes.range_proof_attributes,
        &attributes.date_attributes,
    )?;
    let first = issuer.generate_first_message(
        args.count,
        Some(args.token_information.as_bytes()),
        None,
    )?;
    let issuer_parameters = issuer.issuer_parameters_json()?;

    let mut prover = ProverSession::new(engine);
    prover.configure(&ProverInput {
        first_message: &serde_json::to_string(&first)?,
        issuer_parameters: &issuer_parameters,
        prover_information: args.prover_information.as_bytes(),
        token_information: args.token_information.as_bytes(),
        token_count: args.count,
        claims: &claims,
        date_attributes: &attributes.date_attributes,
    })?;
    let second = prover.generate_second_message(None)?;
    let third = issuer.generate_third_message(&second)?;
    let tokens: Vec<KeyAndToken> = prover.generate_tokens(&serde_json::to_string(&third)?, false)?;

    write_json(&config.files.issuer_parameters, &issuer.issuer_parameters()?)?;
    write_json(&config.files.tokens, &tokens)?;

    println!("Tokens issued!");
    println!("  Claims:   {}", claims.len());
    println!("  Tokens:   {}", tokens.len());
    println!("  Issuer:   {}", config.files.issuer_parameters.display());
    println!("  Saved to: {}", config.files.tokens.display());
    Ok(())
}
