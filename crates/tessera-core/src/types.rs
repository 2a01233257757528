use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;
use crate::wire::IssuerParameters;

/// A named attribute with one or more string values and an assurance level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Attribute name (e.g., "givenName", "dateOfBirth").
    pub name: String,
    /// Raw values. Date attributes carry exactly one.
    pub values: Vec<String>,
    /// Quality/assurance level asserted by the issuer.
    #[serde(rename = "qualitylevel")]
    pub quality_level: String,
}

impl Claim {
    /// Create a claim with a list of values.
    pub fn new(
        name: impl Into<String>,
        values: Vec<String>,
        quality_level: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            values,
            quality_level: quality_level.into(),
        }
    }

    /// Create a claim carrying a single value.
    pub fn single(
        name: impl Into<String>,
        value: impl Into<String>,
        quality_level: impl Into<String>,
    ) -> Self {
        Self::new(name, vec![value.into()], quality_level)
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.quality_level)
    }
}

/// Metadata stored in the property slot of every encoded claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeProperties {
    pub name: String,
    pub qualitylevel: String,
}

impl AttributeProperties {
    /// Canonical JSON bytes, as placed in the property slot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a property slot back into its metadata.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The value and property bytes of one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAttribute {
    pub value: Vec<u8>,
    pub property: Vec<u8>,
}

/// Range-proof bookkeeping for a date attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMetadata {
    pub attribute_name: String,
    /// 1-based index of the value slot in the interleaved attribute list.
    pub encoded_index: usize,
    pub min_year: i32,
    pub max_year: i32,
}

/// Output of [`AttributeEncoder::encode`](crate::encoding::AttributeEncoder::encode).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedClaims {
    pub attributes: Vec<EncodedAttribute>,
    pub range_metadata: Vec<RangeMetadata>,
}

impl EncodedClaims {
    /// Number of claims encoded.
    pub fn claim_count(&self) -> usize {
        self.attributes.len()
    }

    /// Interleave value and property bytes: `[v0, p0, v1, p1, ...]`.
    pub fn to_attribute_pairs(&self) -> Vec<Vec<u8>> {
        self.attributes
            .iter()
            .flat_map(|a| [a.value.clone(), a.property.clone()])
            .collect()
    }

    /// Range metadata for the named attribute, if it was encoded as a date.
    pub fn range_metadata_for(&self, name: &str) -> Option<&RangeMetadata> {
        self.range_metadata
            .iter()
            .find(|m| m.attribute_name == name)
    }

    /// Attribute name of the claim owning the 1-based interleaved `index`.
    pub fn claim_name_at(&self, index: usize) -> Result<String, ProtocolError> {
        if index == 0 {
            return Err(ProtocolError::Configuration(
                "attribute indices are 1-based".into(),
            ));
        }
        let claim = self.attributes.get((index - 1) / 2).ok_or_else(|| {
            ProtocolError::Configuration(format!("attribute index {} out of range", index))
        })?;
        Ok(AttributeProperties::from_bytes(&claim.property)?.name)
    }
}

/// Group construction used by the issuer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupConstruction {
    /// Elliptic-curve group (P-256).
    #[default]
    Ecc,
    /// Prime-order subgroup construction.
    Subgroup,
}

impl GroupConstruction {
    /// Group name as published in `descGq.name`.
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::Ecc => "P-256",
            Self::Subgroup => "L2048N256",
        }
    }

    /// Group type as published in `descGq.type`.
    pub fn group_type(&self) -> &'static str {
        match self {
            Self::Ecc => "ECC",
            Self::Subgroup => "Subgroup",
        }
    }

    /// Resolve a published group name.
    pub fn from_group_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::Ecc),
            "L2048N256" => Some(Self::Subgroup),
            _ => None,
        }
    }
}

impl fmt::Display for GroupConstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_name())
    }
}

/// Fingerprint of an issuer as held in a verifier's trust list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedIssuerEntry {
    pub uidp: Vec<u8>,
    pub generator_g0: Vec<u8>,
    pub hash_algorithm: String,
    pub specification: Vec<u8>,
    pub max_attributes: usize,
    pub group_name: String,
}

impl TrustedIssuerEntry {
    /// Name of the first field that differs from `other`, if any.
    pub fn mismatch(&self, other: &TrustedIssuerEntry) -> Option<&'static str> {
        if self.uidp != other.uidp {
            Some("uidp")
        } else if self.generator_g0 != other.generator_g0 {
            Some("g0")
        } else if self.hash_algorithm != other.hash_algorithm {
            Some("uidh")
        } else if self.specification != other.specification {
            Some("s")
        } else if self.max_attributes != other.max_attributes {
            Some("MaxNumberOfAttributes")
        } else if self.group_name != other.group_name {
            Some("descGq.name")
        } else {
            None
        }
    }
}

impl From<&IssuerParameters> for TrustedIssuerEntry {
    fn from(ip: &IssuerParameters) -> Self {
        Self {
            uidp: ip.uidp.clone(),
            generator_g0: ip.g.first().cloned().unwrap_or_default(),
            hash_algorithm: ip.uidh.clone(),
            specification: ip.s.clone(),
            max_attributes: ip.max_number_of_attributes,
            group_name: ip.desc_gq.name.clone(),
        }
    }
}
