/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed engine payload: {0}")]
    MalformedPayload(String),

    #[error("issuer parameters rejected: {0}")]
    InvalidParameters(String),

    #[error("zero-knowledge proof error: {0}")]
    ZkpError(String),
}

impl From<CryptoError> for tessera_core::ProtocolError {
    fn from(err: CryptoError) -> Self {
        tessera_core::ProtocolError::Engine(err.to_string())
    }
}
