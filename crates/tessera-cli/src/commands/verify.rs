//! `tessera verify` — Verify a presentation.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use tessera_core::wire::{self, IssuerParameters, TrustedIssuerList};
use tessera_crypto::Blake3Engine;
use tessera_presentation::{PresentationVerifier, TrustedIssuerRegistry, VerifierPolicy};

use crate::config::TesseraConfig;
use crate::files::{read_json, read_json_or_default, Presentation};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Presentation file; defaults to the configured path.
    #[arg(short, long)]
    pub presentation: Option<PathBuf>,

    /// Issuer parameters file; defaults to the configured path.
    #[arg(short, long)]
    pub issuer: Option<PathBuf>,
}

struct Check {
    name: &'static str,
    passed: bool,
    detail: Option<String>,
}

impl Check {
    fn from_result<T, E: std::fmt::Display>(name: &'static str, result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Self {
                name,
                passed: true,
                detail: None,
            },
            Err(e) => Self {
                name,
                passed: false,
                detail: Some(e.to_string()),
            },
        }
    }
}

pub fn run(args: &VerifyArgs, config: &TesseraConfig) -> anyhow::Result<()> {
    let files = &config.files;
    let presentation: Presentation =
        read_json(args.presentation.as_ref().unwrap_or(&files.presentation))?;
    let ip: IssuerParameters =
        read_json(args.issuer.as_ref().unwrap_or(&files.issuer_parameters))?;
    let trusted: TrustedIssuerList = read_json_or_default(&files.trusted_issuers)?;
    let policy = if files.policy.exists() {
        VerifierPolicy::from_json(&std::fs::read_to_string(&files.policy)?)?
    } else {
        VerifierPolicy::default()
    };

    let mut verifier = PresentationVerifier::new(
        Arc::new(Blake3Engine::new()),
        Arc::new(TrustedIssuerRegistry::from_list(&trusted)),
    );

    let mut checks = vec![Check::from_result(
        "issuer and base proof",
        verifier.initialize(
            &wire::to_json(&ip)?,
            &wire::to_json(&presentation.proof)?,
            &wire::to_json(&presentation.token)?,
        ),
    )];
    if verifier.proof_accepted() {
        checks.push(Check::from_result(
            "policy answered",
            policy.check_answered(
                &presentation.range_proofs,
                &presentation.set_membership_proofs,
            ),
        ));
        if !presentation.range_proofs.is_empty() {
            checks.push(Check::from_result(
                "range proofs",
                verifier.verify_range_proofs(&presentation.range_proofs, &policy.ranges),
            ));
        }
        if !presentation.set_membership_proofs.is_empty() {
            checks.push(Check::from_result(
                "set membership proofs",
                verifier.verify_set_membership_proofs(
                    &presentation.set_membership_proofs,
                    &policy.members,
                ),
            ));
        }
    }

    let valid = checks.iter().all(|c| c.passed);
    if valid {
        println!("Presentation is VALID");
    } else {
        println!("Presentation is INVALID");
    }
    println!();
    for check in &checks {
        let icon = if check.passed { "PASS" } else { "FAIL" };
        print!("  [{}] {}", icon, check.name);
        if let Some(ref detail) = check.detail {
            print!(": {}", detail);
        }
        println!();
    }
    if let Some(disclosed) = verifier.disclosed_values() {
        println!();
        for value in disclosed {
            println!("  disclosed: {}", String::from_utf8_lossy(value));
        }
    }

    if !valid {
        anyhow::bail!("presentation rejected");
    }
    Ok(())
}
