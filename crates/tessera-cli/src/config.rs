//! CLI configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tessera_core::IssuerSetupConfig;

/// Full configuration for the `tessera` binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TesseraConfig {
    /// Parameters for `tessera setup`.
    #[serde(default)]
    pub issuer: IssuerSetupConfig,

    /// How claims are encoded at issuance.
    #[serde(default)]
    pub attributes: AttributeConfig,

    /// Where artifacts are read from and written to.
    #[serde(default)]
    pub files: FileConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Claims whose value is a `dd.MM.yyyy` date.
    #[serde(default = "default_date_attributes")]
    pub date_attributes: Vec<String>,
    /// Claims that must stay direct-encoded so range proofs can cover them.
    #[serde(default = "default_date_attributes")]
    pub range_proof_attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Issuer parameters together with the issuer private key.
    #[serde(default = "default_issuer_key")]
    pub issuer_key: PathBuf,
    /// Published issuer parameters.
    #[serde(default = "default_issuer_parameters")]
    pub issuer_parameters: PathBuf,
    /// Tokens held by the prover.
    #[serde(default = "default_tokens")]
    pub tokens: PathBuf,
    /// Trusted issuer list of the verifier.
    #[serde(default = "default_trusted_issuers")]
    pub trusted_issuers: PathBuf,
    /// Range and set-membership requirements of the verifier.
    #[serde(default = "default_policy")]
    pub policy: PathBuf,
    /// Last presentation built by `tessera prove`.
    #[serde(default = "default_presentation")]
    pub presentation: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_date_attributes() -> Vec<String> {
    vec!["dateOfBirth".into()]
}
fn default_issuer_key() -> PathBuf {
    PathBuf::from("./data/issuer-key.json")
}
fn default_issuer_parameters() -> PathBuf {
    PathBuf::from("./data/issuer-parameters.json")
}
fn default_tokens() -> PathBuf {
    PathBuf::from("./data/tokens.json")
}
fn default_trusted_issuers() -> PathBuf {
    PathBuf::from("./data/trusted-issuers.json")
}
fn default_policy() -> PathBuf {
    PathBuf::from("./data/policy.json")
}
fn default_presentation() -> PathBuf {
    PathBuf::from("./data/presentation.json")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            date_attributes: default_date_attributes(),
            range_proof_attributes: default_date_attributes(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            issuer_key: default_issuer_key(),
            issuer_parameters: default_issuer_parameters(),
            tokens: default_tokens(),
            trusted_issuers: default_trusted_issuers(),
            policy: default_policy(),
            presentation: default_presentation(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl TesseraConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: TesseraConfig = toml::from_str(&contents)?;
            config.issuer.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
