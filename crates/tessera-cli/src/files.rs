//! JSON artifacts exchanged between the CLI subcommands.

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use tessera_core::wire::{
    IssuerParameters, PresentationProof, RangeProofRecord, SetMembershipProofRecord, Token,
};

/// Issuer parameters persisted together with the issuer private key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerKeyFile {
    pub ip: IssuerParameters,
    /// Base64 private key.
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl IssuerKeyFile {
    pub fn new(ip: IssuerParameters, private_key: &[u8]) -> Self {
        Self {
            ip,
            private_key: BASE64.encode(private_key),
        }
    }

    pub fn private_key_bytes(&self) -> anyhow::Result<Vec<u8>> {
        BASE64
            .decode(&self.private_key)
            .context("issuer private key is not valid base64")
    }
}

/// Everything a verifier needs to check one presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub proof: PresentationProof,
    pub token: Token,
    #[serde(rename = "rangeProofs", default)]
    pub range_proofs: Vec<RangeProofRecord>,
    #[serde(rename = "setMembershipProofs", default)]
    pub set_membership_proofs: Vec<SetMembershipProofRecord>,
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Like [`read_json`], but a missing file yields the default value.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "artifact written");
    Ok(())
}
