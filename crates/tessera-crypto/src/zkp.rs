use rand::RngCore;
use tessera_core::RangeOperator;

use crate::error::CryptoError;
use crate::hashing::{self, Hash};

/// Public statement of a range proof over year-and-day encoded dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeStatement {
    pub operator: RangeOperator,
    pub target: u32,
    pub min: u32,
    pub max: u32,
}

/// A range proof bound to a closed attribute commitment.
///
/// Boundary commitments hide `value - min` and `max - value`; the
/// Fiat-Shamir challenge ties them to the commitment, the statement and
/// the presentation transcript the proof extends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    pub boundary_commitments: [Hash; 2],
    pub challenge: Hash,
    pub response: Hash,
}

/// A set-membership proof bound to a closed attribute commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetMembershipProof {
    /// Merkle root over the hashed set members.
    pub set_root: Hash,
    pub challenge: Hash,
    pub response: Hash,
}

/// Generator for BLAKE3-based commitment proofs.
pub struct Blake3ProofGenerator;

impl Blake3ProofGenerator {
    /// Prove that the committed `value` satisfies `value OP target` and lies
    /// within `[min, max]`.
    pub fn prove_range(
        transcript: &[u8],
        commitment: &[u8],
        value: u32,
        salt: &[u8; 32],
        statement: &RangeStatement,
    ) -> Result<RangeProof, CryptoError> {
        if statement.min > statement.max {
            return Err(CryptoError::ZkpError("invalid range: min > max".into()));
        }
        if value < statement.min || value > statement.max {
            return Err(CryptoError::ZkpError(
                "value lies outside the encodable window".into(),
            ));
        }
        if !statement.operator.holds(value, statement.target) {
            return Err(CryptoError::ZkpError(format!(
                "committed value does not satisfy '{}' against the target",
                statement.operator
            )));
        }

        let lower = boundary_commitment(value - statement.min);
        let upper = boundary_commitment(statement.max - value);
        let challenge = range_challenge(transcript, commitment, &lower, &upper, statement);
        let response = response(&value.to_be_bytes(), salt, &challenge);

        Ok(RangeProof {
            boundary_commitments: [lower, upper],
            challenge,
            response,
        })
    }

    /// Verify a range proof against the commitment it claims to describe.
    pub fn verify_range(
        proof: &RangeProof,
        transcript: &[u8],
        commitment: &[u8],
        statement: &RangeStatement,
    ) -> Result<(), CryptoError> {
        if statement.min > statement.max {
            return Err(CryptoError::ZkpError("invalid range: min > max".into()));
        }
        let [lower, upper] = &proof.boundary_commitments;
        let expected = range_challenge(transcript, commitment, lower, upper, statement);
        if proof.challenge != expected {
            return Err(CryptoError::ZkpError("range proof challenge mismatch".into()));
        }
        Ok(())
    }

    /// Prove that the committed `value` is one of `set`.
    pub fn prove_set_membership(
        transcript: &[u8],
        commitment: &[u8],
        value: &[u8],
        salt: &[u8; 32],
        set: &[Vec<u8>],
    ) -> Result<SetMembershipProof, CryptoError> {
        if !set.iter().any(|item| item.as_slice() == value) {
            return Err(CryptoError::ZkpError("value not in set".into()));
        }

        let set_root = set_root(set);
        let challenge = membership_challenge(transcript, commitment, &set_root);
        let response = response(value, salt, &challenge);

        Ok(SetMembershipProof {
            set_root,
            challenge,
            response,
        })
    }

    /// Verify a set-membership proof for `set` against a commitment.
    pub fn verify_set_membership(
        proof: &SetMembershipProof,
        transcript: &[u8],
        commitment: &[u8],
        set: &[Vec<u8>],
    ) -> Result<(), CryptoError> {
        if proof.set_root != set_root(set) {
            return Err(CryptoError::ZkpError("set root mismatch".into()));
        }
        if proof.challenge != membership_challenge(transcript, commitment, &proof.set_root) {
            return Err(CryptoError::ZkpError(
                "set membership challenge mismatch".into(),
            ));
        }
        Ok(())
    }
}

fn boundary_commitment(diff: u32) -> Hash {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    hashing::create_commitment(&diff.to_be_bytes(), &nonce)
}

fn range_challenge(
    transcript: &[u8],
    commitment: &[u8],
    lower: &Hash,
    upper: &Hash,
    statement: &RangeStatement,
) -> Hash {
    hashing::hash_parts(
        "tessera 2024 range proof challenge",
        &[
            transcript,
            commitment,
            lower,
            upper,
            statement.operator.engine_tag().as_bytes(),
            &statement.target.to_be_bytes(),
            &statement.min.to_be_bytes(),
            &statement.max.to_be_bytes(),
        ],
    )
}

fn set_root(set: &[Vec<u8>]) -> Hash {
    let leaves: Vec<Hash> = set.iter().map(|item| hashing::hash(item)).collect();
    hashing::merkle_root(&leaves)
}

fn membership_challenge(transcript: &[u8], commitment: &[u8], root: &Hash) -> Hash {
    hashing::hash_parts(
        "tessera 2024 set membership challenge",
        &[transcript, commitment, root],
    )
}

fn response(value: &[u8], salt: &[u8; 32], challenge: &Hash) -> Hash {
    hashing::hash_parts("tessera 2024 proof response", &[value, salt, challenge])
}
