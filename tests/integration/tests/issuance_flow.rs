//! Integration test: attribute encoding and the three-message issuance
//! handshake across tessera-core, tessera-crypto and tessera-issuance.

use chrono::Datelike;
use tessera_core::encoding::{issuer_encoding_flags, FLAG_DIRECT, FLAG_HASHED};
use tessera_core::wire::{self, ProofRequirements};
use tessera_core::{
    AttributeProperties, Claim, IssuerSetupConfig, IssuerState, ProtocolError, ProverState,
};
use tessera_integration_tests::*;
use tessera_issuance::{IssuanceSession, ProverInput, ProverSession};

// =========================================================================
// Encoding
// =========================================================================

#[test]
fn test_encoding_interleaves_values_and_properties() {
    let claims = vec![
        Claim::new("givenName", vec!["Alice".into(), "Marie".into()], "loa2"),
        Claim::single("dateOfBirth", born_years_ago(30), "loa3"),
        Claim::single("organization", "BFH", "loa1"),
    ];
    let encoded = encoder().encode(&claims, &date_attributes()).unwrap();
    let pairs = encoded.to_attribute_pairs();

    assert_eq!(pairs.len(), 2 * claims.len());
    assert_eq!(pairs[0], b"Alice, Marie".to_vec());
    for (i, claim) in claims.iter().enumerate() {
        let properties = AttributeProperties::from_bytes(&pairs[2 * i + 1]).unwrap();
        assert_eq!(properties.name, claim.name);
        assert_eq!(properties.qualitylevel, claim.quality_level);
    }
}

#[test]
fn test_date_window_and_index() {
    let claims = student_claims(&born_years_ago(16));
    let encoded = encoder().encode(&claims, &date_attributes()).unwrap();

    assert_eq!(encoded.range_metadata.len(), 1);
    let metadata = &encoded.range_metadata[0];
    assert_eq!(metadata.encoded_index, 5);
    assert_eq!(metadata.encoded_index % 2, 1);
    assert_eq!(metadata.min_year, today().year() - 120);
    assert!(metadata.max_year - metadata.min_year >= 170);
}

#[test]
fn test_encoding_flags_follow_range_attributes() {
    let claims = student_claims(&born_years_ago(16));
    let flags = issuer_encoding_flags(&claims, &["dateOfBirth"]);
    assert_eq!(flags.len(), 8);
    assert_eq!(flags[4], FLAG_DIRECT);
    assert!(flags
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 4)
        .all(|(_, f)| *f == FLAG_HASHED));
}

// =========================================================================
// Issuance handshake
// =========================================================================

#[test]
fn test_two_tokens_issued() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));
    let issued = issue(&engine, &claims, 2);

    assert_eq!(issued.tokens.len(), 2);
    assert_ne!(issued.tokens[0].key, issued.tokens[1].key);
    assert_eq!(issued.parameters.uidp, ISSUER_UIDP.as_bytes());
    assert_eq!(issued.parameters.e[4], FLAG_DIRECT);
}

#[test]
fn test_issued_values_round_trip_into_disclosed_bytes() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));
    let issued = issue(&engine, &claims, 2);

    let requirements = ProofRequirements {
        disclosed_attributes: vec![1, 2, 7, 8],
        committed_attributes: vec![5],
        message: b"nonce".to_vec(),
        ..Default::default()
    };
    let builder = builder_for(&engine, &issued, &claims, requirements);
    let proof = builder.proof().unwrap();

    assert_eq!(proof.disclosed_values.len(), 4);
    assert_eq!(proof.disclosed_values[0], b"Alice".to_vec());
    assert_eq!(proof.disclosed_values[2], b"BFH".to_vec());
    let given = AttributeProperties::from_bytes(&proof.disclosed_values[1]).unwrap();
    assert_eq!(given.name, "givenName");
    let organization = AttributeProperties::from_bytes(&proof.disclosed_values[3]).unwrap();
    assert_eq!(organization.name, "organization");

    let verifier = accepted_verifier(&engine, &issued, &builder);
    assert!(verifier.proof_accepted() && verifier.token_accepted());
}

#[test]
fn test_too_many_claims_never_configures() {
    let engine = engine();
    let setup = IssuerSetupConfig {
        max_number_of_attributes: 6,
        ..IssuerSetupConfig::new(ISSUER_UIDP)
    };
    let mut issuer = IssuanceSession::setup(engine, &setup).unwrap();
    let claims = student_claims(&born_years_ago(25));

    let err = issuer
        .configure(&claims, &date_attributes(), &date_attributes())
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::Configuration(_)));
    assert_eq!(issuer.state(), IssuerState::Created);
    assert!(matches!(
        issuer.issuer_parameters().unwrap_err().cause(),
        ProtocolError::NotConfigured
    ));

    // A fitting claim list still configures afterwards.
    issuer
        .configure(&claims[..3], &date_attributes(), &date_attributes())
        .unwrap();
    assert_eq!(issuer.state(), IssuerState::Configured);
}

#[test]
fn test_malformed_date_rejected() {
    let engine = engine();
    let mut issuer =
        IssuanceSession::setup(engine, &IssuerSetupConfig::new(ISSUER_UIDP)).unwrap();
    let claims = student_claims("2000-01-01");
    let err = issuer
        .configure(&claims, &date_attributes(), &date_attributes())
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::Encoding(_)));
}

#[test]
fn test_prover_rejects_shape_mismatch() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));
    let dates = date_attributes();
    let mut issuer = IssuanceSession::setup(engine.clone(), &IssuerSetupConfig::new(ISSUER_UIDP))
        .unwrap()
        .with_encoder(encoder());
    issuer.configure(&claims, &dates, &dates).unwrap();
    let first = wire::to_json(&issuer.generate_first_message(1, None, None).unwrap()).unwrap();
    let parameters = issuer.issuer_parameters_json().unwrap();

    let mut prover = ProverSession::new(engine).with_encoder(encoder());
    let err = prover
        .configure(&ProverInput {
            first_message: &first,
            issuer_parameters: &parameters,
            prover_information: b"",
            token_information: b"",
            token_count: 1,
            claims: &claims[..3],
            date_attributes: &dates,
        })
        .unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::Configuration(_)));
    assert_eq!(prover.state(), ProverState::Created);
}

#[test]
fn test_messages_out_of_order() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));

    let mut issuer = IssuanceSession::setup(engine.clone(), &IssuerSetupConfig::new(ISSUER_UIDP))
        .unwrap()
        .with_encoder(encoder());
    issuer
        .configure(&claims, &date_attributes(), &date_attributes())
        .unwrap();
    let second = tessera_core::SecondIssuanceMessage(Default::default());
    let err = issuer.generate_third_message(&second).unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProtocolSequence { .. }));
    assert_eq!(issuer.state(), IssuerState::Configured);

    let mut prover = ProverSession::new(engine).with_encoder(encoder());
    let err = prover.generate_second_message(None).unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::ProtocolSequence { .. }));
}

#[test]
fn test_tampered_third_message_fails_token_generation() {
    let engine = engine();
    let claims = student_claims(&born_years_ago(25));
    let dates = date_attributes();
    let mut issuer = IssuanceSession::setup(engine.clone(), &IssuerSetupConfig::new(ISSUER_UIDP))
        .unwrap()
        .with_encoder(encoder());
    issuer.configure(&claims, &dates, &dates).unwrap();
    let first = wire::to_json(&issuer.generate_first_message(1, None, None).unwrap()).unwrap();
    let parameters = issuer.issuer_parameters_json().unwrap();

    let mut prover = ProverSession::new(engine).with_encoder(encoder());
    prover
        .configure(&ProverInput {
            first_message: &first,
            issuer_parameters: &parameters,
            prover_information: b"",
            token_information: b"",
            token_count: 1,
            claims: &claims,
            date_attributes: &dates,
        })
        .unwrap();
    let second = prover.generate_second_message(None).unwrap();
    let _ = issuer.generate_third_message(&second).unwrap();

    let err = prover.generate_tokens("{}", false).unwrap_err();
    assert!(matches!(err.cause(), ProtocolError::TokenGeneration(_)));
    assert_eq!(prover.state(), ProverState::SecondMessageSent);
}
