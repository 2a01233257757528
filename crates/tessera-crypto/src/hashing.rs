/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Domain-separated hash over a list of length-prefixed parts.
///
/// Parts are prefixed with their length so that `["ab", "c"]` and
/// `["a", "bc"]` never collide.
pub fn hash_parts(domain: &str, parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Salted attribute commitment: H(value || salt).
pub fn create_commitment(value: &[u8], salt: &[u8; 32]) -> Hash {
    let mut input = Vec::with_capacity(value.len() + 32);
    input.extend_from_slice(value);
    input.extend_from_slice(salt);
    hash(&input)
}

/// Verify a commitment by recomputing H(value || salt).
pub fn verify_commitment(value: &[u8], salt: &[u8; 32], commitment: &[u8]) -> bool {
    create_commitment(value, salt).as_slice() == commitment
}

/// Compute the Merkle root of a list of hashes.
/// Returns a zero hash for an empty list. Odd nodes are paired with themselves.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<Hash> = hashes.to_vec();
    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|chunk| {
                let right = chunk.get(1).unwrap_or(&chunk[0]);
                let mut combined = Vec::with_capacity(64);
                combined.extend_from_slice(&chunk[0]);
                combined.extend_from_slice(right);
                hash(&combined)
            })
            .collect();
    }

    current_level[0]
}
