//! Integration test: the verifier's trusted issuer registry in front of
//! real issuer parameters.

use tessera_core::types::GroupConstruction;
use tessera_core::wire::{self, IssuerParameters, TrustedIssuerList};
use tessera_core::{IssuerSetupConfig, ProtocolError, TrustedIssuerEntry, VerifierState};
use tessera_integration_tests::*;
use tessera_presentation::{PresentationVerifier, TrustedIssuerRegistry};

fn initialize(
    registry: std::sync::Arc<TrustedIssuerRegistry>,
    issued: &Issued,
    proof: &str,
) -> (PresentationVerifier<tessera_crypto::Blake3Engine>, Result<(), ProtocolError>) {
    let mut verifier = PresentationVerifier::new(engine(), registry).with_encoder(encoder());
    let result = verifier
        .initialize(
            &wire::to_json(&issued.parameters).unwrap(),
            proof,
            &wire::to_json(&issued.tokens[0].token).unwrap(),
        )
        .map_err(|e| e.into_cause());
    (verifier, result)
}

#[test]
fn test_trusted_issuer_accepted() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(30));
    let issued = issue(&engine, &claims, 1);
    let proof = builder_for(&engine, &issued, &claims, binding_requirements())
        .proof_json()
        .unwrap();

    let (verifier, result) = initialize(trusting(&[&issued.parameters]), &issued, &proof);
    result.unwrap();
    assert_eq!(verifier.state(), VerifierState::ProofChecked);
}

#[test]
fn test_unlisted_issuer_rejected() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(30));
    let issued = issue(&engine, &claims, 1);
    let other = issue(&engine, &claims, 1);
    let proof = builder_for(&engine, &issued, &claims, binding_requirements())
        .proof_json()
        .unwrap();

    // Same uidp, different issuer key.
    let (verifier, result) = initialize(trusting(&[&other.parameters]), &issued, &proof);
    assert!(matches!(result, Err(ProtocolError::UntrustedIssuer(_))));
    assert!(!verifier.is_initialized());

    let (_, result) = initialize(trusting(&[]), &issued, &proof);
    assert!(matches!(result, Err(ProtocolError::UntrustedIssuer(_))));
}

#[test]
fn test_any_field_change_flips_acceptance() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(30));
    let issued = issue(&engine, &claims, 1);
    let registry = trusting(&[&issued.parameters]);
    registry.check(&issued.parameters).unwrap();

    let tweaks: Vec<(&str, fn(&mut IssuerParameters))> = vec![
        ("g0", |ip| ip.g[0][0] ^= 0xff),
        ("uidh", |ip| ip.uidh = "SHA-256".into()),
        ("s", |ip| ip.s.push(b'!')),
        ("MaxNumberOfAttributes", |ip| ip.max_number_of_attributes += 1),
        ("descGq.name", |ip| {
            ip.desc_gq.name = GroupConstruction::Subgroup.group_name().into()
        }),
    ];
    for (field, tweak) in tweaks {
        let mut tampered = issued.parameters.clone();
        tweak(&mut tampered);
        let trusted = TrustedIssuerEntry::from(&issued.parameters);
        assert_eq!(trusted.mismatch(&TrustedIssuerEntry::from(&tampered)), Some(field));
        assert!(
            matches!(
                registry.check(&tampered),
                Err(ProtocolError::UntrustedIssuer(_))
            ),
            "changing {} must be rejected",
            field
        );
    }
}

#[test]
fn test_first_listed_entry_wins() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(30));
    let issued = issue(&engine, &claims, 1);
    let impostor = issue(&engine, &claims, 1);
    let proof = builder_for(&engine, &issued, &claims, binding_requirements())
        .proof_json()
        .unwrap();

    let list = TrustedIssuerList {
        issuers: vec![impostor.parameters.clone(), issued.parameters.clone()],
    };
    let registry = TrustedIssuerRegistry::from_json(&wire::to_json(&list).unwrap()).unwrap();
    assert_eq!(registry.count(), 1);

    let (_, result) = initialize(std::sync::Arc::new(registry), &issued, &proof);
    assert!(matches!(result, Err(ProtocolError::UntrustedIssuer(_))));
}

#[test]
fn test_registry_holds_several_issuers() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(30));
    let student = issue(&engine, &claims, 1);
    let staff = issue_with(
        &engine,
        &IssuerSetupConfig::new("bfh-staff-card"),
        &claims,
        1,
    );

    let registry = trusting(&[&student.parameters, &staff.parameters]);
    assert_eq!(registry.count(), 2);
    registry.check(&student.parameters).unwrap();
    registry.check(&staff.parameters).unwrap();

    assert!(registry.remove(b"bfh-staff-card"));
    assert!(registry.check(&staff.parameters).is_err());
    registry.add(&staff.parameters);
    registry.check(&staff.parameters).unwrap();
}
