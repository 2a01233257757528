use ed25519_dalek::{Signer, Verifier};

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Ed25519 signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    inner: ed25519_dalek::Signature,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_arr: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self {
            inner: ed25519_dalek::Signature::from_bytes(&bytes_arr),
        })
    }
}

/// Sign a message using Ed25519.
pub fn sign(message: &[u8], keypair: &KeyPair) -> Signature {
    Signature {
        inner: keypair.signing_key().sign(message),
    }
}

/// Verify an Ed25519 signature.
pub fn verify(message: &[u8], signature: &Signature, pubkey: &PublicKey) -> Result<(), CryptoError> {
    pubkey
        .verifying_key()
        .verify(message, &signature.inner)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Verify a signature given as raw bytes against a raw public key.
pub fn verify_raw(message: &[u8], signature: &[u8], pubkey: &[u8]) -> Result<(), CryptoError> {
    let signature = Signature::from_bytes(signature)?;
    let pubkey = PublicKey::from_bytes(pubkey)?;
    verify(message, &signature, &pubkey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = KeyPair::generate();
        let sig = sign(b"issuer parameters", &kp);
        assert!(verify(b"issuer parameters", &sig, &kp.public_key()).is_ok());
    }

    #[test]
    fn test_verify_wrong_message_fails() {
        let kp = KeyPair::generate();
        let sig = sign(b"correct message", &kp);
        assert!(verify(b"wrong message", &sig, &kp.public_key()).is_err());
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = sign(b"test message", &kp1);
        assert!(verify(b"test message", &sig, &kp2.public_key()).is_err());
    }

    #[test]
    fn test_signature_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let sig = sign(b"test", &kp);
        assert_eq!(Signature::from_bytes(&sig.to_bytes()).unwrap(), sig);
        assert!(Signature::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_verify_raw() {
        let kp = KeyPair::from_seed(&[3u8; 32]);
        let sig = sign(b"token body", &kp);
        assert!(verify_raw(b"token body", &sig.to_bytes(), kp.public_key().as_bytes()).is_ok());
        assert!(verify_raw(b"token body", &sig.to_bytes(), &[1u8; 31]).is_err());
    }
}
