use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

fn sequence_error(operation: &'static str, state: impl fmt::Display) -> ProtocolError {
    ProtocolError::ProtocolSequence {
        operation,
        state: state.to_string(),
    }
}

/// Issuer side of one issuance exchange.
///
/// Valid transitions:
/// - Created → Configured (Configure)
/// - Configured → Configured (Configure)
/// - Configured → FirstMessageSent (SendFirstMessage)
/// - FirstMessageSent → Completed (SendThirdMessage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuerState {
    Created,
    Configured,
    FirstMessageSent,
    /// Final state.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerEvent {
    Configure,
    SendFirstMessage,
    SendThirdMessage,
}

impl IssuerEvent {
    fn operation(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::SendFirstMessage => "generate_first_message",
            Self::SendThirdMessage => "generate_third_message",
        }
    }
}

impl IssuerState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn transition(self, event: IssuerEvent) -> Result<Self, ProtocolError> {
        let next = match (self, event) {
            (Self::Created | Self::Configured, IssuerEvent::Configure) => Self::Configured,
            (Self::Configured, IssuerEvent::SendFirstMessage) => Self::FirstMessageSent,
            (Self::FirstMessageSent, IssuerEvent::SendThirdMessage) => Self::Completed,
            _ => return Err(sequence_error(event.operation(), self)),
        };
        tracing::debug!(from = %self, to = %next, event = ?event, "issuer state transition");
        Ok(next)
    }
}

impl fmt::Display for IssuerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Configured => write!(f, "Configured"),
            Self::FirstMessageSent => write!(f, "FirstMessageSent"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

/// Prover side of one issuance exchange.
///
/// Valid transitions:
/// - Created → Configured (Configure)
/// - Configured → SecondMessageSent (SendSecondMessage)
/// - SecondMessageSent → TokensIssued (IssueTokens)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProverState {
    Created,
    Configured,
    SecondMessageSent,
    /// Final state.
    TokensIssued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProverEvent {
    Configure,
    SendSecondMessage,
    IssueTokens,
}

impl ProverEvent {
    fn operation(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::SendSecondMessage => "generate_second_message",
            Self::IssueTokens => "generate_tokens",
        }
    }
}

impl ProverState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::TokensIssued)
    }

    pub fn transition(self, event: ProverEvent) -> Result<Self, ProtocolError> {
        let next = match (self, event) {
            (Self::Created, ProverEvent::Configure) => Self::Configured,
            (Self::Configured, ProverEvent::SendSecondMessage) => Self::SecondMessageSent,
            (Self::SecondMessageSent, ProverEvent::IssueTokens) => Self::TokensIssued,
            _ => return Err(sequence_error(event.operation(), self)),
        };
        tracing::debug!(from = %self, to = %next, event = ?event, "prover state transition");
        Ok(next)
    }
}

impl fmt::Display for ProverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Configured => write!(f, "Configured"),
            Self::SecondMessageSent => write!(f, "SecondMessageSent"),
            Self::TokensIssued => write!(f, "TokensIssued"),
        }
    }
}

/// Prover side of one presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuilderState {
    Created,
    ProofBuilt,
}

impl BuilderState {
    /// Building a base proof is allowed once.
    pub fn build(self) -> Result<Self, ProtocolError> {
        match self {
            Self::Created => {
                tracing::debug!(from = %self, to = %Self::ProofBuilt, "builder state transition");
                Ok(Self::ProofBuilt)
            }
            Self::ProofBuilt => Err(sequence_error("build_base_proof", self)),
        }
    }

    /// Auxiliary proofs need a base proof to bind to.
    pub fn require_proof(self, operation: &'static str) -> Result<(), ProtocolError> {
        match self {
            Self::ProofBuilt => Ok(()),
            Self::Created => Err(sequence_error(operation, self)),
        }
    }
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::ProofBuilt => write!(f, "ProofBuilt"),
        }
    }
}

/// Verifier side of one presentation.
///
/// Valid transitions:
/// - Created → Initialized (Initialize)
/// - Initialized → ProofChecked (CheckProof)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerifierState {
    Created,
    Initialized,
    ProofChecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierEvent {
    Initialize,
    CheckProof,
}

impl VerifierState {
    pub fn transition(self, event: VerifierEvent) -> Result<Self, ProtocolError> {
        let next = match (self, event) {
            (Self::Created, VerifierEvent::Initialize) => Self::Initialized,
            (Self::Initialized, VerifierEvent::CheckProof) => Self::ProofChecked,
            _ => {
                let operation = match event {
                    VerifierEvent::Initialize => "initialize",
                    VerifierEvent::CheckProof => "verify_base_proof",
                };
                return Err(sequence_error(operation, self));
            }
        };
        tracing::debug!(from = %self, to = %next, event = ?event, "verifier state transition");
        Ok(next)
    }

    /// Auxiliary proof checks need an accepted base proof.
    pub fn require_checked(self, operation: &'static str) -> Result<(), ProtocolError> {
        match self {
            Self::ProofChecked => Ok(()),
            _ => Err(sequence_error(operation, self)),
        }
    }
}

impl fmt::Display for VerifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Initialized => write!(f, "Initialized"),
            Self::ProofChecked => write!(f, "ProofChecked"),
        }
    }
}
