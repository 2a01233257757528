use std::fmt;

use uuid::Uuid;

/// Protocol errors raised by the orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("issuer is not configured; call configure first")]
    NotConfigured,

    #[error("operation '{operation}' is not allowed in state {state}")]
    ProtocolSequence {
        operation: &'static str,
        state: String,
    },

    #[error("arity mismatch: {indices} commitment indices for {specs} verifier specs")]
    ArityMismatch { indices: usize, specs: usize },

    #[error("attribute binding mismatch: expected '{expected}', found '{found}'")]
    AttributeBinding { expected: String, found: String },

    #[error("untrusted issuer: {0}")]
    UntrustedIssuer(String),

    #[error("no verifier spec with id {0}")]
    NoSuchSpec(i32),

    #[error("range spec {id} requires sibling {sibling}, which was not verified")]
    MissingSibling { id: i32, sibling: i32 },

    #[error("{kind} spec {id} has no proof in the presentation")]
    MissingProof { kind: &'static str, id: i32 },

    #[error("'{0}' is not a member of the allowed set")]
    NotAMember(String),

    #[error("attribute '{0}' was hashed, cannot prove range")]
    RangeEncoding(String),

    #[error("unsupported range operator: {0}")]
    UnsupportedOperator(String),

    #[error("proof verification failed: {0}")]
    ProofVerification(String),

    #[error("token generation failed: {0}")]
    TokenGeneration(String),

    #[error("crypto engine error: {0}")]
    Engine(String),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The single failure kind surfaced by session operations.
///
/// Wraps the original [`ProtocolError`] together with the session and the
/// operation that failed. Constructing one logs the failure.
#[derive(Debug, thiserror::Error)]
pub struct CommunicationError {
    operation: &'static str,
    session: Uuid,
    #[source]
    cause: ProtocolError,
}

impl CommunicationError {
    /// Wrap a protocol error raised by `operation` in `session`.
    pub fn new(session: Uuid, operation: &'static str, cause: ProtocolError) -> Self {
        tracing::error!(
            session = %session,
            operation,
            error = %cause,
            "protocol operation failed"
        );
        Self {
            operation,
            session,
            cause,
        }
    }

    /// The error that caused the failure.
    pub fn cause(&self) -> &ProtocolError {
        &self.cause
    }

    /// Consume the wrapper and return the underlying error.
    pub fn into_cause(self) -> ProtocolError {
        self.cause
    }

    /// Name of the operation that failed.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Session in which the failure happened.
    pub fn session(&self) -> Uuid {
        self.session
    }
}

impl fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed in session {}: {}",
            self.operation, self.session, self.cause
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_communication_error_keeps_cause() {
        let session = Uuid::now_v7();
        let err = CommunicationError::new(session, "configure", ProtocolError::NotConfigured);
        assert!(matches!(err.cause(), ProtocolError::NotConfigured));
        assert_eq!(err.operation(), "configure");
        assert_eq!(err.session(), session);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_communication_error_display() {
        let err = CommunicationError::new(
            Uuid::nil(),
            "verify_range_proofs",
            ProtocolError::MissingSibling { id: 1, sibling: 0 },
        );
        let msg = err.to_string();
        assert!(msg.starts_with("verify_range_proofs failed"));
        assert!(msg.contains("sibling 0"));
    }

    #[test]
    fn test_malformed_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }
}
