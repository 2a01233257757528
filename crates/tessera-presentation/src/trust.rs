use dashmap::DashMap;

use tessera_core::wire::{self, IssuerParameters, TrustedIssuerList};
use tessera_core::{ProtocolError, TrustedIssuerEntry};

/// Issuer fingerprints a verifier accepts, keyed by `uidp`.
///
/// Read-mostly; wrap in an `Arc` to share across verifier sessions.
pub struct TrustedIssuerRegistry {
    issuers: DashMap<Vec<u8>, TrustedIssuerEntry>,
}

impl TrustedIssuerRegistry {
    pub fn new() -> Self {
        Self {
            issuers: DashMap::new(),
        }
    }

    /// Build from a trusted issuer list. When several entries share a
    /// `uidp`, the first one is kept.
    pub fn from_list(list: &TrustedIssuerList) -> Self {
        let registry = Self::new();
        for ip in &list.issuers {
            registry
                .issuers
                .entry(ip.uidp.clone())
                .or_insert_with(|| TrustedIssuerEntry::from(ip));
        }
        tracing::debug!(issuers = registry.count(), "trusted issuer registry loaded");
        registry
    }

    /// [`Self::from_list`] over the wire form.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(Self::from_list(&wire::from_json(json)?))
    }

    /// Trust the issuer of `parameters`, replacing any entry with the same `uidp`.
    ///
    /// Unlike [`Self::from_list`], which keeps the first duplicate, the latest
    /// `add` wins so a rotated issuer key can be installed in place.
    pub fn add(&self, parameters: &IssuerParameters) {
        let entry = TrustedIssuerEntry::from(parameters);
        tracing::info!(uidp = %String::from_utf8_lossy(&entry.uidp), "trusted issuer added");
        self.issuers.insert(entry.uidp.clone(), entry);
    }

    /// Stop trusting the issuer with this `uidp`.
    pub fn remove(&self, uidp: &[u8]) -> bool {
        self.issuers.remove(uidp).is_some()
    }

    pub fn contains(&self, uidp: &[u8]) -> bool {
        self.issuers.contains_key(uidp)
    }

    pub fn count(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }

    /// Accept `parameters` only if an entry with the same `uidp` exists and
    /// every other fingerprint field matches it.
    pub fn check(&self, parameters: &IssuerParameters) -> Result<(), ProtocolError> {
        let candidate = TrustedIssuerEntry::from(parameters);
        let trusted = self.issuers.get(&candidate.uidp).ok_or_else(|| {
            ProtocolError::UntrustedIssuer(format!(
                "issuer '{}' is not in the trusted list",
                String::from_utf8_lossy(&candidate.uidp)
            ))
        })?;

        if let Some(field) = trusted.mismatch(&candidate) {
            return Err(ProtocolError::UntrustedIssuer(format!(
                "issuer '{}' has the same uidp but a different {}",
                String::from_utf8_lossy(&candidate.uidp),
                field
            )));
        }
        Ok(())
    }

    /// Snapshot of the trusted entries.
    pub fn entries(&self) -> Vec<TrustedIssuerEntry> {
        self.issuers.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for TrustedIssuerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
