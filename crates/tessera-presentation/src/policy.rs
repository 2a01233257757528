use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tessera_core::wire::{
    self, RangeProofRecord, SetMembershipProofRecord, VerifierMemberSpec, VerifierRangeSpec,
};
use tessera_core::ProtocolError;

/// The range and set-membership requirements a verifier publishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierPolicy {
    #[serde(default, rename = "verifierRanges")]
    pub ranges: Vec<VerifierRangeSpec>,
    #[serde(default, rename = "verifierMembers")]
    pub members: Vec<VerifierMemberSpec>,
}

impl VerifierPolicy {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let policy: Self = wire::from_json(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Ids are unique per kind, operators are known, every sibling exists,
    /// and member lists are non-empty.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let mut range_ids = HashSet::new();
        for spec in &self.ranges {
            if !range_ids.insert(spec.id) {
                return Err(ProtocolError::Configuration(format!(
                    "duplicate range spec id {}",
                    spec.id
                )));
            }
            spec.range_operator()?;
        }
        for spec in &self.ranges {
            if let Some(sibling) = spec.sibling() {
                if !range_ids.contains(&sibling) {
                    return Err(ProtocolError::Configuration(format!(
                        "range spec {} names unknown sibling {}",
                        spec.id, sibling
                    )));
                }
            }
        }

        let mut member_ids = HashSet::new();
        for spec in &self.members {
            if !member_ids.insert(spec.id) {
                return Err(ProtocolError::Configuration(format!(
                    "duplicate member spec id {}",
                    spec.id
                )));
            }
            if spec.members.is_empty() {
                return Err(ProtocolError::Configuration(format!(
                    "member spec {} allows no members",
                    spec.id
                )));
            }
        }
        Ok(())
    }

    /// Every published spec must be answered by at least one record.
    pub fn check_answered(
        &self,
        ranges: &[RangeProofRecord],
        members: &[SetMembershipProofRecord],
    ) -> Result<(), ProtocolError> {
        let answered: HashSet<i32> = ranges.iter().map(|r| r.verifier_range_id).collect();
        if let Some(spec) = self.ranges.iter().find(|s| !answered.contains(&s.id)) {
            return Err(ProtocolError::MissingProof {
                kind: "range",
                id: spec.id,
            });
        }
        let answered: HashSet<i32> = members.iter().map(|m| m.verifier_set_id).collect();
        if let Some(spec) = self.members.iter().find(|s| !answered.contains(&s.id)) {
            return Err(ProtocolError::MissingProof {
                kind: "member",
                id: spec.id,
            });
        }
        Ok(())
    }
}
