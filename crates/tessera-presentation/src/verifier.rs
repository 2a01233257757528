use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tessera_core::wire::{
    self, IssuerParameters, PresentationProof, ProofRequirements, RangeProofRecord,
    SetMembershipProofRecord, Token, VerifierMemberSpec, VerifierRangeSpec,
};
use tessera_core::{
    AttributeEncoder, CommunicationError, ProtocolError, RangeOperator, VerifierEvent,
    VerifierState,
};
use tessera_crypto::{CryptoEngine, MembershipClaim, RangeClaim};
use uuid::Uuid;

use crate::binding::check_binding;
use crate::trust::TrustedIssuerRegistry;

struct Accepted {
    parameters: IssuerParameters,
    proof: PresentationProof,
    token: Token,
}

/// Verifier side of one presentation.
///
/// [`Self::initialize`] checks the issuer against the trusted registry and
/// verifies the base proof. Auxiliary proofs are only checked after that
/// succeeded; any failed check aborts the whole batch.
pub struct PresentationVerifier<E: CryptoEngine> {
    id: Uuid,
    engine: Arc<E>,
    trusted: Arc<TrustedIssuerRegistry>,
    encoder: AttributeEncoder,
    state: VerifierState,
    accepted: Option<Accepted>,
}

impl<E: CryptoEngine> PresentationVerifier<E> {
    pub fn new(engine: Arc<E>, trusted: Arc<TrustedIssuerRegistry>) -> Self {
        Self {
            id: Uuid::now_v7(),
            engine,
            trusted,
            encoder: AttributeEncoder::new(),
            state: VerifierState::Created,
            accepted: None,
        }
    }

    /// Compare range targets against a fixed day instead of today.
    pub fn with_encoder(mut self, encoder: AttributeEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> VerifierState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state != VerifierState::Created
    }

    /// Base proof verified.
    pub fn proof_accepted(&self) -> bool {
        self.state == VerifierState::ProofChecked
    }

    /// Token verified against the issuer.
    pub fn token_accepted(&self) -> bool {
        self.state == VerifierState::ProofChecked
    }

    /// Requirements declared by the accepted proof.
    pub fn requirements(&self) -> Option<&ProofRequirements> {
        self.accepted.as_ref().map(|a| &a.proof.requirements)
    }

    /// Disclosed attribute bytes of the accepted proof.
    pub fn disclosed_values(&self) -> Option<&[Vec<u8>]> {
        self.accepted
            .as_ref()
            .map(|a| a.proof.disclosed_values.as_slice())
    }

    /// Check the issuer, then the base proof over `token`.
    pub fn initialize(
        &mut self,
        issuer_parameters: &str,
        proof: &str,
        token: &str,
    ) -> Result<(), CommunicationError> {
        self.try_initialize(issuer_parameters, proof, token)
            .map_err(|e| CommunicationError::new(self.id, "initialize", e))
    }

    fn try_initialize(
        &mut self,
        issuer_parameters: &str,
        proof: &str,
        token: &str,
    ) -> Result<(), ProtocolError> {
        let initialized = self.state.transition(VerifierEvent::Initialize)?;

        let parameters: IssuerParameters = wire::from_json(issuer_parameters)?;
        self.engine
            .verify_issuer_parameters(&parameters)
            .map_err(|e| ProtocolError::Configuration(format!("issuer parameters: {}", e)))?;
        self.trusted.check(&parameters)?;

        let proof: PresentationProof = wire::from_json(proof)?;
        let token: Token = wire::from_json(token)?;
        tracing::debug!(session = %self.id, state = %initialized, "verifier initialized");

        let checked = initialized.transition(VerifierEvent::CheckProof)?;
        self.verify_base_proof(&parameters, &proof, &token)?;

        self.accepted = Some(Accepted {
            parameters,
            proof,
            token,
        });
        self.state = checked;
        Ok(())
    }

    fn verify_base_proof(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
    ) -> Result<(), ProtocolError> {
        self.engine
            .presentation_proof_verify(parameters, proof, token)
            .map_err(|e| ProtocolError::ProofVerification(e.to_string()))?;

        tracing::info!(
            session = %self.id,
            disclosed = proof.requirements.disclosed_attributes.len(),
            committed = proof.requirements.committed_attributes.len(),
            pseudonym_index = proof.requirements.pseudonym_attribute_index(),
            "presentation proof accepted"
        );
        Ok(())
    }

    fn accepted(&self, operation: &'static str) -> Result<&Accepted, ProtocolError> {
        self.state.require_checked(operation)?;
        self.accepted.as_ref().ok_or(ProtocolError::ProtocolSequence {
            operation,
            state: self.state.to_string(),
        })
    }

    /// Verify every set-membership proof against the spec with its id.
    ///
    /// Returns `true` only when every proof passed; the first failure aborts.
    pub fn verify_set_membership_proofs(
        &self,
        proofs: &[SetMembershipProofRecord],
        specs: &[VerifierMemberSpec],
    ) -> Result<bool, CommunicationError> {
        self.try_set_membership(proofs, specs)
            .map_err(|e| CommunicationError::new(self.id, "verify_set_membership_proofs", e))
    }

    fn try_set_membership(
        &self,
        proofs: &[SetMembershipProofRecord],
        specs: &[VerifierMemberSpec],
    ) -> Result<bool, ProtocolError> {
        let accepted = self.accepted("verify_set_membership_proofs")?;
        let specs = index_by_id(specs, |s| s.id);

        for record in proofs {
            let spec = specs
                .get(&record.verifier_set_id)
                .ok_or(ProtocolError::NoSuchSpec(record.verifier_set_id))?;
            let position = accepted
                .proof
                .requirements
                .committed_position(record.commitment_index)
                .ok_or_else(|| {
                    ProtocolError::ProofVerification(format!(
                        "attribute {} is not committed",
                        record.commitment_index
                    ))
                })?;
            check_binding(&accepted.proof, position, &spec.attribute_name)?;

            self.engine
                .set_membership_proof_verify(
                    &accepted.parameters,
                    &accepted.proof,
                    &accepted.token,
                    &MembershipClaim {
                        attribute_index: record.commitment_index,
                        set_values: &record.set_values,
                    },
                    &record.payload,
                )
                .map_err(|e| ProtocolError::ProofVerification(e.to_string()))?;

            check_members(spec, &record.set_values)?;
            tracing::info!(
                session = %self.id,
                proof_id = spec.id,
                "set membership proof accepted"
            );
        }
        Ok(true)
    }

    /// Verify every range proof against the spec with its id, then require
    /// that the sibling of every checked spec was checked too.
    pub fn verify_range_proofs(
        &self,
        proofs: &[RangeProofRecord],
        specs: &[VerifierRangeSpec],
    ) -> Result<bool, CommunicationError> {
        self.try_range(proofs, specs)
            .map_err(|e| CommunicationError::new(self.id, "verify_range_proofs", e))
    }

    fn try_range(
        &self,
        proofs: &[RangeProofRecord],
        specs: &[VerifierRangeSpec],
    ) -> Result<bool, ProtocolError> {
        let accepted = self.accepted("verify_range_proofs")?;
        let specs = index_by_id(specs, |s| s.id);
        let mut checked: Vec<&VerifierRangeSpec> = Vec::with_capacity(proofs.len());

        for record in proofs {
            let spec = *specs
                .get(&record.verifier_range_id)
                .ok_or(ProtocolError::NoSuchSpec(record.verifier_range_id))?;
            checked.push(spec);

            check_binding(&accepted.proof, record.commitment_index, &spec.attribute_name)?;

            let operator = spec.range_operator()?;
            let declared = RangeOperator::from_symbol(&record.range_operator)
                .ok_or_else(|| ProtocolError::UnsupportedOperator(record.range_operator.clone()))?;
            if declared != operator {
                return Err(ProtocolError::ProofVerification(format!(
                    "range proof {} uses '{}', spec demands '{}'",
                    spec.id, declared, operator
                )));
            }

            let latest = self.encoder.years_before(spec.years_ago)?;
            if record.target_date > latest {
                return Err(ProtocolError::ProofVerification(format!(
                    "range proof {} targets {}, must be on or before {}",
                    spec.id, record.target_date, latest
                )));
            }

            self.engine
                .range_proof_verify(
                    &accepted.parameters,
                    &accepted.proof,
                    &accepted.token,
                    &RangeClaim {
                        commitment_position: record.commitment_index,
                        operator,
                        target_date: record.target_date,
                        min_year: record.min_birth_year,
                        max_year: record.max_birth_year,
                    },
                    &record.payload,
                )
                .map_err(|e| ProtocolError::ProofVerification(e.to_string()))?;

            tracing::info!(
                session = %self.id,
                proof_id = spec.id,
                operator = %operator,
                "range proof accepted"
            );
        }

        check_siblings(&checked)?;
        Ok(true)
    }
}

/// Specs by id; the first spec with a given id wins.
fn index_by_id<T>(specs: &[T], id: impl Fn(&T) -> i32) -> HashMap<i32, &T> {
    let mut map = HashMap::with_capacity(specs.len());
    for spec in specs {
        map.entry(id(spec)).or_insert(spec);
    }
    map
}

fn check_siblings(checked: &[&VerifierRangeSpec]) -> Result<(), ProtocolError> {
    let ids: HashSet<i32> = checked.iter().map(|s| s.id).collect();
    for spec in checked {
        if let Some(sibling) = spec.sibling() {
            if !ids.contains(&sibling) {
                return Err(ProtocolError::MissingSibling {
                    id: spec.id,
                    sibling,
                });
            }
        }
    }
    Ok(())
}

/// Every submitted value must be one of the spec's members.
fn check_members(spec: &VerifierMemberSpec, values: &[Vec<u8>]) -> Result<(), ProtocolError> {
    if spec.members.is_empty() {
        return Err(ProtocolError::Configuration(format!(
            "member spec {} allows no members",
            spec.id
        )));
    }
    for value in values {
        let value = String::from_utf8_lossy(value);
        if !spec.members.iter().any(|m| *m == value) {
            return Err(ProtocolError::NotAMember(value.into_owned()));
        }
    }
    Ok(())
}
