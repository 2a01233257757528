//! Shared fixtures for the cross-crate tests.
//!
//! Dates are computed relative to today so the tests do not rot.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tessera_core::encoding::{years_before, DATE_FORMAT};
use tessera_core::wire::{
    self, IssuerParameters, KeyAndToken, ProofRequirements, TrustedIssuerList, VerifierMemberSpec,
    VerifierRangeSpec,
};
use tessera_core::{AttributeEncoder, Claim, IssuerSetupConfig};
use tessera_crypto::Blake3Engine;
use tessera_issuance::{IssuanceSession, ProverInput, ProverSession};
use tessera_presentation::{PresentationBuilder, PresentationVerifier, TrustedIssuerRegistry};

pub const ISSUER_UIDP: &str = "bfh-student-card";

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn encoder() -> AttributeEncoder {
    AttributeEncoder::at(today())
}

pub fn engine() -> Arc<Blake3Engine> {
    Arc::new(Blake3Engine::new())
}

pub fn date_attributes() -> Vec<String> {
    vec!["dateOfBirth".into()]
}

/// Birth date `years` before today, in claim format.
pub fn born_years_ago(years: u32) -> String {
    years_before(today(), years)
        .unwrap()
        .format(DATE_FORMAT)
        .to_string()
}

/// Four claims; `dateOfBirth` is attribute 5, `organization` attribute 7.
pub fn student_claims(date_of_birth: &str) -> Vec<Claim> {
    vec![
        Claim::single("givenName", "Alice", "loa2"),
        Claim::single("familyName", "Muster", "loa2"),
        Claim::single("dateOfBirth", date_of_birth, "loa3"),
        Claim::single("organization", "BFH", "loa1"),
    ]
}

/// Issuer parameters and tokens from a complete handshake.
pub struct Issued {
    pub parameters: IssuerParameters,
    pub tokens: Vec<KeyAndToken>,
}

/// Run the full three-message handshake for `claims`.
pub fn issue(engine: &Arc<Blake3Engine>, claims: &[Claim], token_count: usize) -> Issued {
    issue_with(
        engine,
        &IssuerSetupConfig::new(ISSUER_UIDP),
        claims,
        token_count,
    )
}

pub fn issue_with(
    engine: &Arc<Blake3Engine>,
    setup: &IssuerSetupConfig,
    claims: &[Claim],
    token_count: usize,
) -> Issued {
    let dates = date_attributes();
    let mut issuer = IssuanceSession::setup(engine.clone(), setup)
        .unwrap()
        .with_encoder(encoder());
    issuer.configure(claims, &dates, &dates).unwrap();
    let first = issuer
        .generate_first_message(token_count, Some(b"semester 2"), None)
        .unwrap();
    let parameters_json = issuer.issuer_parameters_json().unwrap();

    let mut prover = ProverSession::new(engine.clone()).with_encoder(encoder());
    prover
        .configure(&ProverInput {
            first_message: &wire::to_json(&first).unwrap(),
            issuer_parameters: &parameters_json,
            prover_information: b"",
            token_information: b"semester 2",
            token_count,
            claims,
            date_attributes: &dates,
        })
        .unwrap();
    let second = prover.generate_second_message(None).unwrap();
    let third = issuer.generate_third_message(&second).unwrap();
    let tokens = prover
        .generate_tokens(&wire::to_json(&third).unwrap(), false)
        .unwrap();

    Issued {
        parameters: issuer.issuer_parameters().unwrap(),
        tokens,
    }
}

/// Commit `dateOfBirth` and `organization`, disclosing their property slots
/// in the same order so auxiliary proofs can be bound to them.
pub fn binding_requirements() -> ProofRequirements {
    ProofRequirements {
        disclosed_attributes: vec![6, 8],
        committed_attributes: vec![5, 7],
        message: b"verifier nonce".to_vec(),
        ..Default::default()
    }
}

pub fn builder_for(
    engine: &Arc<Blake3Engine>,
    issued: &Issued,
    claims: &[Claim],
    requirements: ProofRequirements,
) -> PresentationBuilder<Blake3Engine> {
    let mut builder = PresentationBuilder::new(engine.clone()).with_encoder(encoder());
    builder
        .build_base_proof(
            &issued.parameters,
            claims,
            requirements,
            &issued.tokens[0],
            &date_attributes(),
            None,
        )
        .unwrap();
    builder
}

pub fn trusting(parameters: &[&IssuerParameters]) -> Arc<TrustedIssuerRegistry> {
    Arc::new(TrustedIssuerRegistry::from_list(&TrustedIssuerList {
        issuers: parameters.iter().map(|ip| (*ip).clone()).collect(),
    }))
}

/// A verifier that has accepted the builder's base proof.
pub fn accepted_verifier(
    engine: &Arc<Blake3Engine>,
    issued: &Issued,
    builder: &PresentationBuilder<Blake3Engine>,
) -> PresentationVerifier<Blake3Engine> {
    let mut verifier = PresentationVerifier::new(engine.clone(), trusting(&[&issued.parameters]))
        .with_encoder(encoder());
    verifier
        .initialize(
            &wire::to_json(&issued.parameters).unwrap(),
            &builder.proof_json().unwrap(),
            &wire::to_json(&issued.tokens[0].token).unwrap(),
        )
        .unwrap();
    verifier
}

/// Age window `(18, 14]` years as a sibling pair: born no later than
/// 14 years ago and after 18 years ago.
pub fn age_window_specs() -> Vec<VerifierRangeSpec> {
    vec![
        VerifierRangeSpec {
            id: 0,
            attribute_name: "dateOfBirth".into(),
            operator: "<=".into(),
            years_ago: 14,
            sibling: 1,
        },
        VerifierRangeSpec {
            id: 1,
            attribute_name: "dateOfBirth".into(),
            operator: ">".into(),
            years_ago: 18,
            sibling: 0,
        },
    ]
}

pub fn university_spec() -> VerifierMemberSpec {
    VerifierMemberSpec {
        id: 0,
        attribute_name: "organization".into(),
        members: vec!["BFH".into(), "ETH".into(), "UniBern".into()],
    }
}
