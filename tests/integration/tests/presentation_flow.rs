//! Integration test: presentation proofs with range and set-membership
//! proofs, built by the prover and checked by the verifier.

use std::sync::Arc;

use tessera_core::encoding::years_before;
use tessera_core::wire::{self, ProofRequirements, SetMembershipProofRecord, VerifierRangeSpec};
use tessera_core::{Claim, ProtocolError, VerifierState};
use tessera_integration_tests::*;
use tessera_presentation::{PresentationVerifier, VerifierPolicy};

// =========================================================================
// Range proofs
// =========================================================================

#[test]
fn test_sibling_age_window_accepted() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    let specs = age_window_specs();
    let records = builder.generate_range_proofs(&[5, 5], &specs).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].range_operator, "<=");
    assert_eq!(records[1].range_operator, ">");
    assert!(records.iter().all(|r| r.commitment_index == 0));

    let verifier = accepted_verifier(&engine, &issued, &builder);
    assert!(verifier.verify_range_proofs(&records, &specs).unwrap());
}

#[test]
fn test_one_sided_sibling_rejected() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());
    let specs = age_window_specs();
    let verifier = accepted_verifier(&engine, &issued, &builder);

    for (index, other) in [(0usize, 1), (1, 0)] {
        let records = builder
            .generate_range_proofs(&[5], &specs[index..=index])
            .unwrap();
        let err = verifier.verify_range_proofs(&records, &specs).unwrap_err();
        assert!(matches!(
            err.cause(),
            ProtocolError::MissingSibling { id, sibling }
                if *id == index as i32 && *sibling == other
        ));
    }
}

#[test]
fn test_standalone_range_spec_needs_no_sibling() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    let adult = vec![VerifierRangeSpec {
        id: 3,
        attribute_name: "dateOfBirth".into(),
        operator: "<=".into(),
        years_ago: 18,
        sibling: -1,
    }];
    let records = builder.generate_range_proofs(&[5], &adult).unwrap();
    let verifier = accepted_verifier(&engine, &issued, &builder);
    assert!(verifier.verify_range_proofs(&records, &adult).unwrap());
}

#[test]
fn test_newer_target_date_rejected() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());
    let specs = age_window_specs();

    // The prover proves against a 12-year bound although 14 years are demanded.
    let mut looser = specs.clone();
    looser[0].years_ago = 12;
    let records = builder.generate_range_proofs(&[5, 5], &looser).unwrap();
    assert_eq!(records[0].target_date, years_before(today(), 12).unwrap());

    let verifier = accepted_verifier(&engine, &issued, &builder);
    let err = verifier.verify_range_proofs(&records, &specs).unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProofVerification(_)));
}

#[test]
fn test_statement_outside_window_not_provable() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    // Born 25 years ago is not after 18 years ago.
    let err = builder
        .generate_range_proofs(&[5, 5], &age_window_specs())
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::Engine(_)));
}

#[test]
fn test_range_spec_on_wrong_attribute() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());
    let records = builder
        .generate_range_proofs(&[5, 5], &age_window_specs())
        .unwrap();

    // The verifier's spec now names a different attribute than the one bound.
    let mut specs = age_window_specs();
    specs[0].attribute_name = "organization".into();
    let verifier = accepted_verifier(&engine, &issued, &builder);
    let err = verifier.verify_range_proofs(&records, &specs).unwrap_err();
    assert!(matches!(
        err.cause(),
        ProtocolError::AttributeBinding { expected, found }
            if expected == "organization" && found == "dateOfBirth"
    ));
}

// =========================================================================
// Set membership
// =========================================================================

#[test]
fn test_member_of_allowed_set() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    let spec = university_spec();
    let records = builder
        .generate_set_membership_proofs(&[7], &[spec.clone()])
        .unwrap();
    assert_eq!(records[0].commitment_index, 7);

    let verifier = accepted_verifier(&engine, &issued, &builder);
    assert!(verifier
        .verify_set_membership_proofs(&records, &[spec])
        .unwrap());
}

#[test]
fn test_values_outside_allowed_set() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    let mut widened = university_spec();
    widened.members.push("EPFL".into());
    let records = builder
        .generate_set_membership_proofs(&[7], &[widened])
        .unwrap();

    let verifier = accepted_verifier(&engine, &issued, &builder);
    let err = verifier
        .verify_set_membership_proofs(&records, &[university_spec()])
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::NotAMember(value) if value == "EPFL"));
}

#[test]
fn test_unknown_member_spec() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());
    let records = builder
        .generate_set_membership_proofs(&[7], &[university_spec()])
        .unwrap();

    let mut renumbered = university_spec();
    renumbered.id = 9;
    let verifier = accepted_verifier(&engine, &issued, &builder);
    let err = verifier
        .verify_set_membership_proofs(&records, &[renumbered])
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::NoSuchSpec(0)));
}

#[test]
fn test_member_spec_on_wrong_attribute() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    let mut spec = university_spec();
    spec.attribute_name = "familyName".into();
    let err = builder
        .generate_set_membership_proofs(&[7], &[spec])
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::AttributeBinding { .. }));
}

#[test]
fn test_reordered_slots_cannot_borrow_another_name() {
    let engine = engine();
    let claims = vec![
        Claim::single("givenName", "Alice", "loa2"),
        Claim::single("familyName", "ETH", "loa2"),
        Claim::single("dateOfBirth", born_years_ago(16), "loa3"),
        Claim::single("organization", "HackerU", "loa1"),
    ];
    let issued = issue(&engine, &claims, 1);

    // familyName's value sits at the position of organization's property.
    let requirements = ProofRequirements {
        disclosed_attributes: vec![8, 4],
        committed_attributes: vec![3, 7],
        message: b"verifier nonce".to_vec(),
        ..Default::default()
    };
    let builder = builder_for(&engine, &issued, &claims, requirements);
    let err = builder
        .generate_set_membership_proofs(&[3], &[university_spec()])
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::AttributeBinding { .. }));

    let verifier = accepted_verifier(&engine, &issued, &builder);
    let forged = SetMembershipProofRecord {
        verifier_set_id: 0,
        commitment_index: 3,
        set_values: vec![b"ETH".to_vec()],
        payload: Default::default(),
    };
    let err = verifier
        .verify_set_membership_proofs(&[forged], &[university_spec()])
        .unwrap_err();
    assert!(matches!(
        err.cause(),
        ProtocolError::AttributeBinding { expected, .. } if expected == "organization"
    ));
}

#[test]
fn test_records_bound_to_their_presentation() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let earlier = builder_for(&engine, &issued, &claims, binding_requirements());
    let current = builder_for(
        &engine,
        &issued,
        &claims,
        ProofRequirements {
            message: b"a different verifier nonce".to_vec(),
            ..binding_requirements()
        },
    );

    let members = earlier
        .generate_set_membership_proofs(&[7], &[university_spec()])
        .unwrap();
    let ranges = earlier
        .generate_range_proofs(&[5, 5], &age_window_specs())
        .unwrap();

    let verifier = accepted_verifier(&engine, &issued, &current);
    let err = verifier
        .verify_set_membership_proofs(&members, &[university_spec()])
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProofVerification(_)));
    let err = verifier
        .verify_range_proofs(&ranges, &age_window_specs())
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProofVerification(_)));
}

// =========================================================================
// Whole presentation
// =========================================================================

#[test]
fn test_policy_driven_presentation() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let policy = VerifierPolicy {
        ranges: age_window_specs(),
        members: vec![university_spec()],
    };
    policy.validate().unwrap();
    let policy = VerifierPolicy::from_json(&serde_json::to_string(&policy).unwrap()).unwrap();

    let builder = builder_for(&engine, &issued, &claims, binding_requirements());
    let ranges = builder
        .generate_range_proofs(&[5, 5], &policy.ranges)
        .unwrap();
    let members = builder
        .generate_set_membership_proofs(&[7], &policy.members)
        .unwrap();

    // Records travel as JSON.
    let ranges: Vec<_> = wire::from_json(&wire::to_json(&ranges).unwrap()).unwrap();
    let members: Vec<_> = wire::from_json(&wire::to_json(&members).unwrap()).unwrap();

    policy.check_answered(&ranges, &members).unwrap();
    assert!(matches!(
        policy.check_answered(&ranges, &[]),
        Err(ProtocolError::MissingProof { kind: "member", id: 0 })
    ));

    let verifier = accepted_verifier(&engine, &issued, &builder);
    assert_eq!(verifier.state(), VerifierState::ProofChecked);
    assert!(verifier.verify_range_proofs(&ranges, &policy.ranges).unwrap());
    assert!(verifier
        .verify_set_membership_proofs(&members, &policy.members)
        .unwrap());
}

#[test]
fn test_scope_pseudonym_round_trip() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let requirements = ProofRequirements {
        scope: Some(b"library.bfh.ch".to_vec()),
        ..binding_requirements()
    };
    assert_eq!(requirements.pseudonym_attribute_index(), 1);

    let builder = builder_for(&engine, &issued, &claims, requirements);
    let verifier = accepted_verifier(&engine, &issued, &builder);
    assert!(verifier.proof_accepted());
}

#[test]
fn test_proof_for_other_token_rejected() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 2);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());

    let mut verifier = PresentationVerifier::new(engine.clone(), trusting(&[&issued.parameters]))
        .with_encoder(encoder());
    let err = verifier
        .initialize(
            &wire::to_json(&issued.parameters).unwrap(),
            &builder.proof_json().unwrap(),
            &wire::to_json(&issued.tokens[1].token).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProofVerification(_)));
    assert!(!verifier.proof_accepted() && !verifier.token_accepted());

    // Auxiliary proofs are refused until a base proof was accepted.
    let err = verifier
        .verify_set_membership_proofs(&[], &[university_spec()])
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProtocolSequence { .. }));
}

#[test]
fn test_registry_shared_across_verifiers() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(16));
    let issued = issue(&engine, &claims, 1);
    let builder = builder_for(&engine, &issued, &claims, binding_requirements());
    let registry = trusting(&[&issued.parameters]);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let registry = Arc::clone(&registry);
            let ip = wire::to_json(&issued.parameters).unwrap();
            let proof = builder.proof_json().unwrap();
            let token = wire::to_json(&issued.tokens[0].token).unwrap();
            std::thread::spawn(move || {
                let mut verifier =
                    PresentationVerifier::new(engine, registry).with_encoder(encoder());
                verifier.initialize(&ip, &proof, &token).is_ok()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
