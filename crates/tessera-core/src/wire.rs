//! JSON wire messages exchanged between issuer, prover, and verifier.
//!
//! Field names are fixed by the peers we interoperate with. Byte arrays
//! travel as standard base64. Fields that only the crypto engine interprets
//! are carried in a flattened [`EnginePayload`].

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::range::RangeOperator;

/// Engine-specific fields, opaque to the orchestration layer.
pub type EnginePayload = serde_json::Map<String, serde_json::Value>;

/// Decode any wire object.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(json)?)
}

/// Encode any wire object.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

/// `descGq`: the group the issuer parameters live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Issuer parameters (`IP`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerParameters {
    #[serde(with = "b64")]
    pub uidp: Vec<u8>,
    /// Hash algorithm identifier.
    pub uidh: String,
    #[serde(rename = "descGq")]
    pub desc_gq: GroupDescription,
    #[serde(with = "b64_vec")]
    pub g: Vec<Vec<u8>>,
    #[serde(with = "b64")]
    pub e: Vec<u8>,
    /// Free-text issuer specification.
    #[serde(with = "b64")]
    pub s: Vec<u8>,
    #[serde(rename = "MaxNumberOfAttributes")]
    pub max_number_of_attributes: usize,
    #[serde(flatten)]
    pub extensions: EnginePayload,
}

/// Issuer → prover, first issuance message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirstIssuanceMessage(pub EnginePayload);

/// Prover → issuer, second issuance message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecondIssuanceMessage(pub EnginePayload);

/// Issuer → prover, third issuance message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThirdIssuanceMessage(pub EnginePayload);

/// An issued token. Its private key travels separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub EnginePayload);

/// A token together with its private key, as kept by the prover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyAndToken {
    #[serde(with = "b64")]
    pub key: Vec<u8>,
    pub token: Token,
}

/// Which encoded-attribute indices a presentation reveals or commits.
///
/// Indices are 1-based positions in the interleaved attribute list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequirements {
    #[serde(rename = "disclosedAttributes")]
    pub disclosed_attributes: Vec<usize>,
    #[serde(rename = "committedAttributes")]
    pub committed_attributes: Vec<usize>,
    #[serde(with = "b64")]
    pub message: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub scope: Option<Vec<u8>>,
    #[serde(
        rename = "deviceMessage",
        default,
        skip_serializing_if = "Option::is_none",
        with = "b64_opt"
    )]
    pub device_message: Option<Vec<u8>>,
}

impl ProofRequirements {
    /// Attribute index the scope-exclusive pseudonym is derived from.
    /// `0` means no pseudonym.
    pub fn pseudonym_attribute_index(&self) -> usize {
        if self.scope.is_some() {
            1
        } else {
            0
        }
    }

    /// Position of an attribute index within the committed list.
    pub fn committed_position(&self, index: usize) -> Option<usize> {
        self.committed_attributes.iter().position(|c| *c == index)
    }
}

/// A presentation proof (`Proof`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationProof {
    /// Disclosed attribute bytes, aligned with `disclosedAttributes`.
    #[serde(rename = "D", with = "b64_vec")]
    pub disclosed_values: Vec<Vec<u8>>,
    pub requirements: ProofRequirements,
    #[serde(flatten)]
    pub payload: EnginePayload,
}

/// An auxiliary range proof bound to a committed attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeProofRecord {
    #[serde(rename = "verifiersRangeProofId")]
    pub verifier_range_id: i32,
    /// Position of the bound attribute within the committed list.
    #[serde(rename = "commitmentIndex")]
    pub commitment_index: usize,
    /// Operator symbol, e.g. `">="`.
    #[serde(rename = "rangeProofType")]
    pub range_operator: String,
    #[serde(rename = "targetDate")]
    pub target_date: NaiveDate,
    #[serde(rename = "minBirthYear")]
    pub min_birth_year: i32,
    #[serde(rename = "maxBirthYear")]
    pub max_birth_year: i32,
    #[serde(flatten)]
    pub payload: EnginePayload,
}

/// An auxiliary set-membership proof bound to a committed attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMembershipProofRecord {
    #[serde(rename = "verifiersSetMembershipProofId")]
    pub verifier_set_id: i32,
    /// Attribute index of the bound attribute.
    #[serde(rename = "commitmentIndex")]
    pub commitment_index: usize,
    #[serde(rename = "setValues", with = "b64_vec")]
    pub set_values: Vec<Vec<u8>>,
    #[serde(flatten)]
    pub payload: EnginePayload,
}

/// Trusted issuers held by a verifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustedIssuerList {
    pub issuers: Vec<IssuerParameters>,
}

fn no_sibling() -> i32 {
    -1
}

/// A range requirement published by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierRangeSpec {
    #[serde(rename = "verifiersRangeProofId")]
    pub id: i32,
    #[serde(rename = "rangeProofAttribute")]
    pub attribute_name: String,
    /// Operator symbol.
    #[serde(rename = "rangeProofType")]
    pub operator: String,
    /// Years before today the bound lies at.
    #[serde(rename = "number")]
    pub years_ago: u32,
    /// Id of the spec that must be verified together with this one, `-1` for none.
    #[serde(default = "no_sibling")]
    pub sibling: i32,
}

impl VerifierRangeSpec {
    pub fn sibling(&self) -> Option<i32> {
        (self.sibling >= 0).then_some(self.sibling)
    }

    pub fn range_operator(&self) -> Result<RangeOperator, ProtocolError> {
        RangeOperator::from_symbol(&self.operator)
            .ok_or_else(|| ProtocolError::UnsupportedOperator(self.operator.clone()))
    }
}

/// A set-membership requirement published by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierMemberSpec {
    #[serde(rename = "verifiersSetMembershipProofId")]
    pub id: i32,
    #[serde(rename = "MemberAttribute")]
    pub attribute_name: String,
    #[serde(rename = "Members")]
    pub members: Vec<String>,
}

mod b64 {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

mod b64_opt {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&BASE64.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod b64_vec {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|b| BASE64.encode(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
