use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::GroupConstruction;

/// Hard upper bound on `MaxNumberOfAttributes`.
pub const MAX_ATTRIBUTES_CAP: usize = 50;

fn default_max_attributes() -> usize {
    12
}

fn default_specification() -> String {
    "tessera credential".into()
}

/// Inputs for setting up a fresh issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerSetupConfig {
    /// Issuer parameters unique identifier.
    pub uidp: String,
    /// Free-text description of the credential being issued.
    #[serde(default = "default_specification")]
    pub specification: String,
    /// Maximum number of encoded attributes (two per claim).
    #[serde(default = "default_max_attributes")]
    pub max_number_of_attributes: usize,
    #[serde(default)]
    pub group: GroupConstruction,
    /// Whether tokens are bound to a device key.
    #[serde(default)]
    pub device_protected: bool,
}

impl Default for IssuerSetupConfig {
    fn default() -> Self {
        Self {
            uidp: "tessera-issuer".into(),
            specification: default_specification(),
            max_number_of_attributes: default_max_attributes(),
            group: GroupConstruction::default(),
            device_protected: false,
        }
    }
}

impl IssuerSetupConfig {
    pub fn new(uidp: impl Into<String>) -> Self {
        Self {
            uidp: uidp.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.uidp.is_empty() {
            return Err(ProtocolError::Configuration(
                "issuer identifier must not be empty".into(),
            ));
        }
        if self.max_number_of_attributes == 0 {
            return Err(ProtocolError::Configuration(
                "MaxNumberOfAttributes must be positive".into(),
            ));
        }
        if self.max_number_of_attributes > MAX_ATTRIBUTES_CAP {
            return Err(ProtocolError::Configuration(format!(
                "MaxNumberOfAttributes {} exceeds the cap of {}",
                self.max_number_of_attributes, MAX_ATTRIBUTES_CAP
            )));
        }
        Ok(())
    }
}
