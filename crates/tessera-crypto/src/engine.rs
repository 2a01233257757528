//! The capability interface the orchestration layer drives.
//!
//! Sessions never touch group arithmetic or signatures directly; they build
//! the requests below from encoded attributes and hand them to a
//! [`CryptoEngine`]. Secrets produced by one step and consumed by a later
//! one are kept in memory as the engine's associated types.

use chrono::NaiveDate;
use tessera_core::wire::{
    EnginePayload, FirstIssuanceMessage, IssuerParameters, KeyAndToken, PresentationProof,
    ProofRequirements, SecondIssuanceMessage, ThirdIssuanceMessage, Token,
};
use tessera_core::{IssuerSetupConfig, RangeOperator};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Issuer parameters together with the issuer's private key.
#[derive(Clone)]
pub struct IssuerKeyAndParameters {
    pub parameters: IssuerParameters,
    pub private_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for IssuerKeyAndParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKeyAndParameters")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Issuer-side inputs for the first issuance message.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    /// Interleaved value/property attribute bytes.
    pub attributes: Vec<Vec<u8>>,
    pub token_count: usize,
    /// Token information field (`ti`).
    pub token_information: Vec<u8>,
    pub device_public_key: Option<Vec<u8>>,
}

/// Prover-side inputs for the second issuance message.
#[derive(Debug, Clone)]
pub struct ProverRequest {
    pub attributes: Vec<Vec<u8>>,
    pub token_count: usize,
    pub token_information: Vec<u8>,
    /// Prover information field (`pi`).
    pub prover_information: Vec<u8>,
    pub device_public_key: Option<Vec<u8>>,
}

/// Inputs for a base presentation proof.
#[derive(Debug, Clone)]
pub struct PresentationRequest {
    pub attributes: Vec<Vec<u8>>,
    pub requirements: ProofRequirements,
}

/// Public statement of a range proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeClaim {
    /// Position of the bound attribute within the committed list.
    pub commitment_position: usize,
    pub operator: RangeOperator,
    pub target_date: NaiveDate,
    pub min_year: i32,
    pub max_year: i32,
}

/// Public statement of a set-membership proof.
#[derive(Debug, Clone, Copy)]
pub struct MembershipClaim<'a> {
    /// 1-based attribute index of the bound attribute.
    pub attribute_index: usize,
    pub set_values: &'a [Vec<u8>],
}

/// Key generation, issuance, presentation, and auxiliary proofs.
pub trait CryptoEngine: Send + Sync {
    /// Issuer secret kept between the first and third message.
    type IssuanceSecret: Send;
    /// Prover secret kept between the second message and token generation.
    type ProverSecret: Send;
    /// Openings of the committed attributes of a presentation proof.
    type CommitmentSecrets: Send;
    /// Device holding the device key of a device-protected token.
    type DeviceContext: Send + Sync;

    /// Generate a fresh issuer key and parameters.
    fn setup_issuer(&self, config: &IssuerSetupConfig)
        -> Result<IssuerKeyAndParameters, CryptoError>;

    /// Resume an issuer from persisted parameters and private key.
    fn load_issuer(
        &self,
        parameters: IssuerParameters,
        private_key: &[u8],
    ) -> Result<IssuerKeyAndParameters, CryptoError>;

    /// Structural and signature checks on published issuer parameters.
    fn verify_issuer_parameters(&self, parameters: &IssuerParameters) -> Result<(), CryptoError>;

    /// Parameters with new encoding flags baked in.
    fn rebuild_issuer_parameters(
        &self,
        issuer: &IssuerKeyAndParameters,
        encoding_flags: &[u8],
    ) -> Result<IssuerKeyAndParameters, CryptoError>;

    /// Whether tokens of this issuer must be bound to a device key.
    fn is_device_protected(&self, parameters: &IssuerParameters) -> bool;

    fn issuer_first_message(
        &self,
        issuer: &IssuerKeyAndParameters,
        request: &IssuanceRequest,
    ) -> Result<(FirstIssuanceMessage, Self::IssuanceSecret), CryptoError>;

    fn issuer_third_message(
        &self,
        issuer: &IssuerKeyAndParameters,
        secret: &Self::IssuanceSecret,
        second: &SecondIssuanceMessage,
    ) -> Result<ThirdIssuanceMessage, CryptoError>;

    fn prover_second_message(
        &self,
        parameters: &IssuerParameters,
        request: &ProverRequest,
        first: &FirstIssuanceMessage,
    ) -> Result<(SecondIssuanceMessage, Self::ProverSecret), CryptoError>;

    fn prover_generate_tokens(
        &self,
        parameters: &IssuerParameters,
        secret: &Self::ProverSecret,
        third: &ThirdIssuanceMessage,
        skip_device_validation: bool,
    ) -> Result<Vec<KeyAndToken>, CryptoError>;

    fn presentation_proof_generate(
        &self,
        parameters: &IssuerParameters,
        request: &PresentationRequest,
        key_and_token: &KeyAndToken,
        device: Option<&Self::DeviceContext>,
    ) -> Result<(PresentationProof, Self::CommitmentSecrets), CryptoError>;

    fn presentation_proof_verify(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
    ) -> Result<(), CryptoError>;

    fn range_proof_generate(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        secrets: &Self::CommitmentSecrets,
        claim: &RangeClaim,
    ) -> Result<EnginePayload, CryptoError>;

    fn range_proof_verify(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
        claim: &RangeClaim,
        payload: &EnginePayload,
    ) -> Result<(), CryptoError>;

    fn set_membership_proof_generate(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        secrets: &Self::CommitmentSecrets,
        claim: &MembershipClaim<'_>,
    ) -> Result<EnginePayload, CryptoError>;

    fn set_membership_proof_verify(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
        claim: &MembershipClaim<'_>,
        payload: &EnginePayload,
    ) -> Result<(), CryptoError>;
}
