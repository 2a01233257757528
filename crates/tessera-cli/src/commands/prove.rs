//! `tessera prove` — Build a presentation from a stored token.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use tessera_core::wire::{IssuerParameters, KeyAndToken, ProofRequirements};
use tessera_core::Claim;
use tessera_crypto::Blake3Engine;
use tessera_presentation::{PresentationBuilder, VerifierPolicy};

use crate::config::TesseraConfig;
use crate::files::{read_json, write_json, Presentation};

#[derive(Args, Debug)]
pub struct ProveArgs {
    /// JSON file with the claims the token was issued over.
    #[arg(long)]
    pub claims: PathBuf,

    /// Which stored token to present.
    #[arg(long, default_value_t = 0)]
    pub token_index: usize,

    /// Attribute indices to disclose, comma-separated.
    #[arg(short, long, value_delimiter = ',')]
    pub disclosed: Vec<usize>,

    /// Attribute indices to commit, comma-separated.
    #[arg(short = 'C', long, value_delimiter = ',')]
    pub committed: Vec<usize>,

    /// Verifier nonce bound into the proof.
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Scope for a scope-exclusive pseudonym.
    #[arg(long)]
    pub scope: Option<String>,

    /// Attribute index per policy range requirement, comma-separated.
    #[arg(long, value_delimiter = ',')]
    pub range_indices: Vec<usize>,

    /// Attribute index per policy membership requirement, comma-separated.
    #[arg(long, value_delimiter = ',')]
    pub member_indices: Vec<usize>,
}

pub fn run(args: &ProveArgs, config: &TesseraConfig) -> anyhow::Result<()> {
    let claims: Vec<Claim> = read_json(&args.claims)?;
    let ip: IssuerParameters = read_json(&config.files.issuer_parameters)?;
    let mut tokens: Vec<KeyAndToken> = read_json(&config.files.tokens)?;
    if args.token_index >= tokens.len() {
        anyhow::bail!(
            "token {} requested, {} stored",
            args.token_index,
            tokens.len()
        );
    }
    let token = tokens.swap_remove(args.token_index);

    let policy = if args.range_indices.is_empty() && args.member_indices.is_empty() {
        VerifierPolicy::default()
    } else {
        VerifierPolicy::from_json(&std::fs::read_to_string(&config.files.policy)?)?
    };

    let requirements = ProofRequirements {
        disclosed_attributes: args.disclosed.clone(),
        committed_attributes: args.committed.clone(),
        message: args.message.as_bytes().to_vec(),
        scope: args.scope.as_ref().map(|s| s.as_bytes().to_vec()),
        device_message: None,
    };

    let mut builder = PresentationBuilder::new(Arc::new(Blake3Engine::new()));
    builder.build_base_proof(
        &ip,
        &claims,
        requirements,
        &token,
        &config.attributes.date_attributes,
        None,
    )?;

    let range_proofs = if args.range_indices.is_empty() {
        Vec::new()
    } else {
        builder.generate_range_proofs(&args.range_indices, &policy.ranges)?
    };
    let set_membership_proofs = if args.member_indices.is_empty() {
        Vec::new()
    } else {
        builder.generate_set_membership_proofs(&args.member_indices, &policy.members)?
    };

    let proof = builder
        .proof()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no presentation proof was built"))?;
    let presentation = Presentation {
        proof,
        token: token.token,
        range_proofs,
        set_membership_proofs,
    };
    write_json(&config.files.presentation, &presentation)?;

    println!("Presentation built!");
    println!("  Disclosed:   {:?}", args.disclosed);
    println!("  Committed:   {:?}", args.committed);
    println!("  Range:       {}", presentation.range_proofs.len());
    println!("  Membership:  {}", presentation.set_membership_proofs.len());
    println!("  Saved to:    {}", config.files.presentation.display());
    Ok(())
}
