use std::sync::Arc;

use tessera_core::encoding::FLAG_DIRECT;
use tessera_core::wire::{
    self, IssuerParameters, KeyAndToken, PresentationProof, ProofRequirements, RangeProofRecord,
    SetMembershipProofRecord, VerifierMemberSpec, VerifierRangeSpec,
};
use tessera_core::{
    AttributeEncoder, BuilderState, Claim, CommunicationError, EncodedClaims, ProtocolError,
};
use tessera_crypto::{CryptoEngine, MembershipClaim, PresentationRequest, RangeClaim};
use uuid::Uuid;

use crate::binding::check_binding;

struct Built<S> {
    parameters: IssuerParameters,
    encoded: EncodedClaims,
    proof: PresentationProof,
    secrets: S,
}

/// Prover side of one presentation.
///
/// Builds the base proof once, then any number of range and set-membership
/// proofs bound to its committed attributes.
pub struct PresentationBuilder<E: CryptoEngine> {
    id: Uuid,
    engine: Arc<E>,
    encoder: AttributeEncoder,
    state: BuilderState,
    built: Option<Built<E::CommitmentSecrets>>,
}

impl<E: CryptoEngine> PresentationBuilder<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            id: Uuid::now_v7(),
            engine,
            encoder: AttributeEncoder::new(),
            state: BuilderState::Created,
            built: None,
        }
    }

    /// Anchor date encoding and range targets at a fixed day instead of today.
    pub fn with_encoder(mut self, encoder: AttributeEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// The base proof built by [`Self::build_base_proof`].
    pub fn proof(&self) -> Option<&PresentationProof> {
        self.built.as_ref().map(|b| &b.proof)
    }

    /// [`Self::proof`] in wire form.
    pub fn proof_json(&self) -> Result<String, CommunicationError> {
        let proof = self.proof().ok_or_else(|| {
            CommunicationError::new(
                self.id,
                "proof",
                ProtocolError::ProtocolSequence {
                    operation: "proof",
                    state: self.state.to_string(),
                },
            )
        })?;
        wire::to_json(proof).map_err(|e| CommunicationError::new(self.id, "proof", e))
    }

    /// Build the base presentation proof over `token`.
    ///
    /// `claims` must be the claims the token was issued for, in the same
    /// order; `device` is required for device-protected tokens.
    pub fn build_base_proof(
        &mut self,
        parameters: &IssuerParameters,
        claims: &[Claim],
        requirements: ProofRequirements,
        token: &KeyAndToken,
        date_attributes: &[String],
        device: Option<&E::DeviceContext>,
    ) -> Result<PresentationProof, CommunicationError> {
        self.try_build(parameters, claims, requirements, token, date_attributes, device)
            .map_err(|e| CommunicationError::new(self.id, "build_base_proof", e))
    }

    fn try_build(
        &mut self,
        parameters: &IssuerParameters,
        claims: &[Claim],
        requirements: ProofRequirements,
        token: &KeyAndToken,
        date_attributes: &[String],
        device: Option<&E::DeviceContext>,
    ) -> Result<PresentationProof, ProtocolError> {
        let next = self.state.build()?;

        let encoded = self.encoder.encode(claims, date_attributes)?;
        let request = PresentationRequest {
            attributes: encoded.to_attribute_pairs(),
            requirements,
        };
        let (proof, secrets) = self
            .engine
            .presentation_proof_generate(parameters, &request, token, device)?;

        tracing::info!(
            session = %self.id,
            disclosed = proof.requirements.disclosed_attributes.len(),
            committed = proof.requirements.committed_attributes.len(),
            "base presentation proof built"
        );

        self.built = Some(Built {
            parameters: parameters.clone(),
            encoded,
            proof: proof.clone(),
            secrets,
        });
        self.state = next;
        Ok(proof)
    }

    fn built(
        &self,
        operation: &'static str,
    ) -> Result<&Built<E::CommitmentSecrets>, ProtocolError> {
        self.state.require_proof(operation)?;
        self.built.as_ref().ok_or(ProtocolError::ProtocolSequence {
            operation,
            state: self.state.to_string(),
        })
    }

    /// One set-membership proof per `(attribute index, spec)` pair.
    ///
    /// Each index must be committed in the base proof and its disclosed
    /// property must name the spec's attribute.
    pub fn generate_set_membership_proofs(
        &self,
        commitment_indices: &[usize],
        specs: &[VerifierMemberSpec],
    ) -> Result<Vec<SetMembershipProofRecord>, CommunicationError> {
        self.try_set_membership(commitment_indices, specs)
            .map_err(|e| CommunicationError::new(self.id, "generate_set_membership_proofs", e))
    }

    fn try_set_membership(
        &self,
        commitment_indices: &[usize],
        specs: &[VerifierMemberSpec],
    ) -> Result<Vec<SetMembershipProofRecord>, ProtocolError> {
        let built = self.built("generate_set_membership_proofs")?;
        if commitment_indices.len() != specs.len() {
            return Err(ProtocolError::ArityMismatch {
                indices: commitment_indices.len(),
                specs: specs.len(),
            });
        }

        let mut records = Vec::with_capacity(specs.len());
        for (index, spec) in commitment_indices.iter().zip(specs) {
            let position = built
                .proof
                .requirements
                .committed_position(*index)
                .ok_or_else(|| {
                    ProtocolError::Configuration(format!("attribute {} is not committed", index))
                })?;
            check_binding(&built.proof, position, &spec.attribute_name)?;

            let set_values: Vec<Vec<u8>> = spec
                .members
                .iter()
                .map(|m| m.as_bytes().to_vec())
                .collect();
            let payload = self.engine.set_membership_proof_generate(
                &built.parameters,
                &built.proof,
                &built.secrets,
                &MembershipClaim {
                    attribute_index: *index,
                    set_values: &set_values,
                },
            )?;

            tracing::info!(
                session = %self.id,
                proof_id = spec.id,
                attribute = %spec.attribute_name,
                "set membership proof created"
            );
            records.push(SetMembershipProofRecord {
                verifier_set_id: spec.id,
                commitment_index: *index,
                set_values,
                payload,
            });
        }
        Ok(records)
    }

    /// One range proof per `(attribute index, spec)` pair.
    ///
    /// The target date of each proof is today minus the spec's years; the
    /// year window comes from the attribute's range metadata.
    pub fn generate_range_proofs(
        &self,
        commitment_indices: &[usize],
        specs: &[VerifierRangeSpec],
    ) -> Result<Vec<RangeProofRecord>, CommunicationError> {
        self.try_range(commitment_indices, specs)
            .map_err(|e| CommunicationError::new(self.id, "generate_range_proofs", e))
    }

    fn try_range(
        &self,
        commitment_indices: &[usize],
        specs: &[VerifierRangeSpec],
    ) -> Result<Vec<RangeProofRecord>, ProtocolError> {
        let built = self.built("generate_range_proofs")?;
        if commitment_indices.len() != specs.len() {
            return Err(ProtocolError::ArityMismatch {
                indices: commitment_indices.len(),
                specs: specs.len(),
            });
        }

        // Range proofs need the value in the clear inside the token.
        for metadata in &built.encoded.range_metadata {
            let flag = metadata
                .encoded_index
                .checked_sub(1)
                .and_then(|i| built.parameters.e.get(i));
            if flag != Some(&FLAG_DIRECT) {
                return Err(ProtocolError::RangeEncoding(metadata.attribute_name.clone()));
            }
        }

        let mut records = Vec::with_capacity(specs.len());
        for (index, spec) in commitment_indices.iter().zip(specs) {
            let name = built.encoded.claim_name_at(*index)?;
            let metadata = built.encoded.range_metadata_for(&name).ok_or_else(|| {
                ProtocolError::Configuration(format!("attribute '{}' is not a date attribute", name))
            })?;
            let position = built
                .proof
                .requirements
                .committed_position(metadata.encoded_index)
                .ok_or_else(|| {
                    ProtocolError::Configuration(format!(
                        "attribute {} is not committed",
                        metadata.encoded_index
                    ))
                })?;
            check_binding(&built.proof, position, &spec.attribute_name)?;

            let operator = spec.range_operator()?;
            let target_date = self.encoder.years_before(spec.years_ago)?;
            let payload = self.engine.range_proof_generate(
                &built.parameters,
                &built.proof,
                &built.secrets,
                &RangeClaim {
                    commitment_position: position,
                    operator,
                    target_date,
                    min_year: metadata.min_year,
                    max_year: metadata.max_year,
                },
            )?;

            tracing::info!(
                session = %self.id,
                proof_id = spec.id,
                operator = %operator,
                target = %target_date,
                "range proof created"
            );
            records.push(RangeProofRecord {
                verifier_range_id: spec.id,
                commitment_index: position,
                range_operator: operator.symbol().to_string(),
                target_date,
                min_birth_year: metadata.min_year,
                max_birth_year: metadata.max_year,
                payload,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use tessera_core::IssuerSetupConfig;
    use tessera_crypto::Blake3Engine;
    use tessera_issuance::{IssuanceSession, ProverInput, ProverSession};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn claims() -> Vec<Claim> {
        vec![
            Claim::single("givenName", "Alice", "loa2"),
            Claim::single("dateOfBirth", "15.03.2010", "loa3"),
            Claim::single("organization", "BFH", "loa1"),
        ]
    }

    fn dates() -> Vec<String> {
        vec!["dateOfBirth".into()]
    }

    fn issue(
        engine: &Arc<Blake3Engine>,
        range_attributes: &[String],
    ) -> (IssuerParameters, KeyAndToken) {
        let encoder = AttributeEncoder::at(today());
        let mut issuer =
            IssuanceSession::setup(engine.clone(), &IssuerSetupConfig::new("builder-issuer"))
                .unwrap()
                .with_encoder(encoder);
        issuer
            .configure(&claims(), range_attributes, &dates())
            .unwrap();
        let first = wire::to_json(&issuer.generate_first_message(1, None, None).unwrap()).unwrap();
        let ip = issuer.issuer_parameters_json().unwrap();

        let claims = claims();
        let dates = dates();
        let mut prover = ProverSession::new(engine.clone()).with_encoder(encoder);
        prover
            .configure(&ProverInput {
                first_message: &first,
                issuer_parameters: &ip,
                prover_information: b"",
                token_information: b"",
                token_count: 1,
                claims: &claims,
                date_attributes: &dates,
            })
            .unwrap();
        let second = prover.generate_second_message(None).unwrap();
        let third = wire::to_json(&issuer.generate_third_message(&second).unwrap()).unwrap();
        let mut tokens = prover.generate_tokens(&third, false).unwrap();
        (issuer.issuer_parameters().unwrap(), tokens.remove(0))
    }

    fn requirements() -> ProofRequirements {
        ProofRequirements {
            disclosed_attributes: vec![4, 6],
            committed_attributes: vec![3, 5],
            message: b"verifier nonce".to_vec(),
            ..Default::default()
        }
    }

    fn built(range_attributes: &[String]) -> PresentationBuilder<Blake3Engine> {
        let engine = Arc::new(Blake3Engine::new());
        let (ip, token) = issue(&engine, range_attributes);
        let mut builder =
            PresentationBuilder::new(engine).with_encoder(AttributeEncoder::at(today()));
        builder
            .build_base_proof(&ip, &claims(), requirements(), &token, &dates(), None)
            .unwrap();
        builder
    }

    fn range_spec(id: i32, operator: &str, years: u32, sibling: i32) -> VerifierRangeSpec {
        VerifierRangeSpec {
            id,
            attribute_name: "dateOfBirth".into(),
            operator: operator.into(),
            years_ago: years,
            sibling,
        }
    }

    fn member_spec(attribute: &str) -> VerifierMemberSpec {
        VerifierMemberSpec {
            id: 7,
            attribute_name: attribute.into(),
            members: vec!["BFH".into(), "ETH".into(), "UniBern".into()],
        }
    }

    #[test]
    fn test_base_proof_discloses_properties() {
        let builder = built(&dates());
        let proof = builder.proof().unwrap();
        assert_eq!(proof.disclosed_values.len(), 2);
        assert!(builder.proof_json().unwrap().contains("\"D\""));
        assert_eq!(builder.state(), BuilderState::ProofBuilt);
    }

    #[test]
    fn test_auxiliary_proofs_need_base_proof() {
        let builder = PresentationBuilder::new(Arc::new(Blake3Engine::new()));
        let err = builder
            .generate_set_membership_proofs(&[5], &[member_spec("organization")])
            .unwrap_err();
        assert!(matches!(err.cause(), ProtocolError::ProtocolSequence { .. }));
        assert!(builder.proof().is_none());
        assert!(builder.proof_json().is_err());
    }

    #[test]
    fn test_set_membership_record() {
        let builder = built(&dates());
        let records = builder
            .generate_set_membership_proofs(&[5], &[member_spec("organization")])
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].verifier_set_id, 7);
        assert_eq!(records[0].commitment_index, 5);
        assert_eq!(records[0].set_values[0], b"BFH".to_vec());
    }

    #[test]
    fn test_set_membership_wrong_attribute() {
        let builder = built(&dates());
        let err = builder
            .generate_set_membership_proofs(&[5], &[member_spec("givenName")])
            .unwrap_err();
        assert!(matches!(err.cause(), ProtocolError::AttributeBinding { .. }));
    }

    #[test]
    fn test_arity_mismatch() {
        let builder = built(&dates());
        let err = builder
            .generate_range_proofs(&[3, 3], &[range_spec(0, "<=", 14, -1)])
            .unwrap_err();
        assert!(matches!(
            err.cause(),
            ProtocolError::ArityMismatch { indices: 2, specs: 1 }
        ));
    }

    #[test]
    fn test_range_record_stamped() {
        let builder = built(&dates());
        let records = builder
            .generate_range_proofs(&[3], &[range_spec(0, "<=", 14, -1)])
            .unwrap();
        let record = &records[0];
        assert_eq!(record.verifier_range_id, 0);
        assert_eq!(record.commitment_index, 0);
        assert_eq!(record.range_operator, "<=");
        assert_eq!(record.target_date, NaiveDate::from_ymd_opt(2012, 10, 15).unwrap());
        assert_eq!(record.min_birth_year, today().year() - 120);
        assert_eq!(record.max_birth_year, today().year() + 50);
    }

    #[test]
    fn test_range_over_hashed_attribute() {
        let builder = built(&[]);
        let err = builder
            .generate_range_proofs(&[3], &[range_spec(0, "<=", 14, -1)])
            .unwrap_err();
        assert!(matches!(err.cause(), ProtocolError::RangeEncoding(_)));
    }

    #[test]
    fn test_range_unsupported_operator() {
        let builder = built(&dates());
        let err = builder
            .generate_range_proofs(&[3], &[range_spec(0, "=<", 14, -1)])
            .unwrap_err();
        assert!(matches!(err.cause(), ProtocolError::UnsupportedOperator(_)));
    }

    #[test]
    fn test_base_proof_built_once() {
        let engine = Arc::new(Blake3Engine::new());
        let (ip, token) = issue(&engine, &dates());
        let mut builder =
            PresentationBuilder::new(engine).with_encoder(AttributeEncoder::at(today()));
        builder
            .build_base_proof(&ip, &claims(), requirements(), &token, &dates(), None)
            .unwrap();
        assert!(builder
            .build_base_proof(&ip, &claims(), requirements(), &token, &dates(), None)
            .is_err());
    }
}
