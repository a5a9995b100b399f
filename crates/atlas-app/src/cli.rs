//! CLI argument definitions for the Atlas client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use atlas_core::AtlasConfig;

/// Atlas: a conversational client for a geospatial analysis agent.
#[derive(Parser, Debug, Default)]
#[command(name = "atlas", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the agent server.
    #[arg(short = 'u', long = "base-url")]
    pub base_url: Option<String>,

    /// Caller identity sent with every request.
    #[arg(short = 'i', long = "identity")]
    pub identity: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > ATLAS_CONFIG env var > ~/.atlas/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ATLAS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Fold flag overrides into the loaded configuration.
    pub fn apply(&self, config: &mut AtlasConfig) {
        if let Some(ref url) = self.base_url {
            config.server.base_url = url.clone();
        }
        if let Some(ref identity) = self.identity {
            config.server.identity = identity.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".atlas").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".atlas").join("config.toml");
    }
    PathBuf::from("config.toml")
}
