//! Tessera Presentation — selective-disclosure proofs over issued tokens.
//!
//! - [`PresentationBuilder`]: prover side, builds the base proof and the
//!   range / set-membership proofs bound to its committed attributes
//! - [`PresentationVerifier`]: verifier side, checks the issuer against a
//!   [`TrustedIssuerRegistry`], the base proof, and the auxiliary proofs
//! - [`VerifierPolicy`]: the range and membership specs a verifier publishes

mod binding;
pub mod builder;
pub mod policy;
pub mod trust;
pub mod verifier;

pub use builder::PresentationBuilder;
pub use policy::VerifierPolicy;
pub use trust::TrustedIssuerRegistry;
pub use verifier::PresentationVerifier;
