//! Tessera Core — data model, attribute encoding, wire messages, session
//! state machines, and errors for the Tessera anonymous credential protocol.

pub mod config;
pub mod encoding;
pub mod error;
pub mod range;
pub mod session_state;
pub mod types;
pub mod wire;

pub use config::IssuerSetupConfig;
pub use encoding::AttributeEncoder;
pub use error::{CommunicationError, ProtocolError};
pub use range::RangeOperator;
pub use session_state::{
    BuilderState, IssuerEvent, IssuerState, ProverEvent, ProverState, VerifierEvent,
    VerifierState,
};
pub use types::{
    AttributeProperties, Claim, EncodedAttribute, EncodedClaims, GroupConstruction, RangeMetadata,
    TrustedIssuerEntry,
};
pub use wire::{
    FirstIssuanceMessage, IssuerParameters, KeyAndToken, PresentationProof, ProofRequirements,
    RangeProofRecord, SecondIssuanceMessage, SetMembershipProofRecord, ThirdIssuanceMessage,
    Token, TrustedIssuerList, VerifierMemberSpec, VerifierRangeSpec,
};
