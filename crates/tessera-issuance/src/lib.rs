//! Tessera Issuance — the issuer and prover halves of the three-message
//! token issuance handshake.

pub mod issuer;
pub mod prover;

pub use issuer::IssuanceSession;
pub use prover::{ProverInput, ProverSession};
