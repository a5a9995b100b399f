use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AtlasError, Result};

/// Top-level configuration for the Atlas client.
///
/// Loaded from `~/.atlas/config.toml` by default. Every section is optional
/// in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl AtlasConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AtlasConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AtlasError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Connection to the assistant backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL the `/history`, `/chat` and `/jobs` routes hang off.
    pub base_url: String,
    /// Caller identity attached to every request. Fixed for the process.
    pub identity: String,
    /// Header carrying the caller identity.
    pub identity_header: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            identity: "researcher_01".to_string(),
            identity_header: "x-forwarded-user".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Conversation presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Transcript text shown in place of a reply when the call fails.
    pub transport_error_message: String,
    /// Status line text while a turn is awaiting its reply.
    pub thinking_status: String,
    /// MIME type used for inline (base64) picture payloads.
    pub inline_picture_mime: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            transport_error_message: "Error communicating with agent.".to_string(),
            thinking_status: "Agent thinking...".to_string(),
            inline_picture_mime: "image/png".to_string(),
        }
    }
}

/// Recurring-query scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Status text shown when scheduling fails.
    pub error_message: String,
    /// Prefix put in front of the server's acknowledgement.
    pub success_prefix: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            error_message: "Error scheduling job.".to_string(),
            success_prefix: "Job Scheduled: ".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AtlasConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.server.identity, "researcher_01");
        assert_eq!(config.server.identity_header, "x-forwarded-user");
        assert_eq!(config.server.request_timeout_secs, 120);
        assert_eq!(
            config.chat.transport_error_message,
            "Error communicating with agent."
        );
        assert_eq!(config.chat.thinking_status, "Agent thinking...");
        assert_eq!(config.chat.inline_picture_mime, "image/png");
        assert_eq!(config.jobs.error_message, "Error scheduling job.");
        assert_eq!(config.jobs.success_prefix, "Job Scheduled: ");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
base_url = "https://assistant.example.org"
identity = "analyst_7"
identity_header = "x-user"
request_timeout_secs = 30

[chat]
transport_error_message = "Agent unreachable."
thinking_status = "Working..."
inline_picture_mime = "image/jpeg"

[jobs]
error_message = "Could not schedule."
success_prefix = "Scheduled: "
"#;
        let file = create_temp_config(content);
        let config = AtlasConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.base_url, "https://assistant.example.org");
        assert_eq!(config.server.identity, "analyst_7");
        assert_eq!(config.server.identity_header, "x-user");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.chat.transport_error_message, "Agent unreachable.");
        assert_eq!(config.chat.thinking_status, "Working...");
        assert_eq!(config.chat.inline_picture_mime, "image/jpeg");
        assert_eq!(config.jobs.error_message, "Could not schedule.");
        assert_eq!(config.jobs.success_prefix, "Scheduled: ");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[server]
identity = "someone_else"
"#;
        let file = create_temp_config(content);
        let config = AtlasConfig::load(file.path()).unwrap();
        assert_eq!(config.server.identity, "someone_else");
        // Remaining fields use defaults
        assert_eq!(config.server.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.jobs.success_prefix, "Job Scheduled: ");
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[server\nbase_url = ");
        let err = AtlasConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AtlasConfig::load_or_default(Path::new("/nonexistent/atlas.toml"));
        assert_eq!(config.server.identity, "researcher_01");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AtlasConfig::default();
        config.server.base_url = "http://10.0.0.5:9000".to_string();
        config.save(&path).unwrap();

        let reloaded = AtlasConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.base_url, "http://10.0.0.5:9000");
        assert_eq!(reloaded.server.identity, config.server.identity);
        assert_eq!(reloaded.chat.thinking_status, config.chat.thinking_status);
    }
}
