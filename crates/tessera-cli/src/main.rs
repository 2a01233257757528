//! Tessera CLI — run anonymous credential issuance and presentation over
//! JSON files.
//!
//! Subcommands: init, setup, issue, prove, verify, trust.

mod commands;
mod config;
mod files;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{LoggingConfig, TesseraConfig};

/// Tessera — anonymous credentials with selective disclosure.
#[derive(Parser, Debug)]
#[command(name = "tessera", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "tessera.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the log format (text, json).
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Generate a new issuer key and issuer parameters.
    Setup(commands::setup::SetupArgs),
    /// Run the issuance handshake and store the resulting tokens.
    Issue(commands::issue::IssueArgs),
    /// Build a presentation proof from a stored token.
    Prove(commands::prove::ProveArgs),
    /// Verify a presentation against the trusted issuers and policy.
    Verify(commands::verify::VerifyArgs),
    /// Manage the verifier's trusted issuer list.
    Trust(commands::trust::TrustArgs),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = TesseraConfig::load(&cli.config)?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    init_tracing(&config.logging);

    match &cli.command {
        Commands::Init(args) => commands::init::run(args, &cli.config),
        Commands::Setup(args) => commands::setup::run(args, &config),
        Commands::Issue(args) => commands::issue::run(args, &config),
        Commands::Prove(args) => commands::prove::run(args, &config),
        Commands::Verify(args) => commands::verify::run(args, &config),
        Commands::Trust(args) => commands::trust::run(args, &config),
    }
}
