//! Tessera Crypto — the engine capability the protocol sessions drive, plus
//! a BLAKE3 / Ed25519 reference engine.

pub mod blake3_engine;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod payload;
pub mod signing;
pub mod zkp;

pub use blake3_engine::{Blake3Engine, CommitmentOpenings};
pub use engine::{
    CryptoEngine, IssuanceRequest, IssuerKeyAndParameters, MembershipClaim, PresentationRequest,
    ProverRequest, RangeClaim,
};
pub use error::CryptoError;
pub use keys::{KeyPair, PublicKey};
