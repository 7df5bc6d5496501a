//! Settings file: server defaults plus the store configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use mailstore_core::StoreConfig;
use mailstore_imap::Security;
use serde::{Deserialize, Serialize};

/// Transport security as written in settings and on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Plain text.
    None,
    /// STARTTLS upgrade.
    #[value(name = "starttls")]
    StartTls,
    /// TLS from the start.
    #[default]
    Tls,
}

impl From<SecurityMode> for Security {
    fn from(mode: SecurityMode) -> Self {
        match mode {
            SecurityMode::None => Self::None,
            SecurityMode::StartTls => Self::StartTls,
            SecurityMode::Tls => Self::Implicit,
        }
    }
}

/// Server defaults, overridden by command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// IMAP host.
    pub host: Option<String>,
    /// IMAP port, defaulting to the security mode's port.
    pub port: Option<u16>,
    /// Transport security.
    pub security: SecurityMode,
    /// Login name.
    pub username: Option<String>,
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server defaults.
    pub server: ServerSettings,
    /// Store configuration.
    pub store: StoreConfig,
}

impl Settings {
    /// `<config dir>/mailstore/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailstore")
            .join("config.json")
    }

    /// Loads settings. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    fn parse(contents: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(contents)?;
        settings.store.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = Settings::parse(
            r#"{"server": {"host": "imap.example.com", "security": "starttls"},
                "store": {"folder_names": {"trash": "Deleted Items"}}}"#,
        )
        .unwrap();
        assert_eq!(settings.server.host.as_deref(), Some("imap.example.com"));
        assert_eq!(settings.server.security, SecurityMode::StartTls);
        assert_eq!(settings.server.port, None);
        assert_eq!(settings.store.folder_names.trash, "Deleted Items");
        assert_eq!(settings.store.block_size, 1000);
    }

    #[test]
    fn invalid_store_values_are_rejected() {
        assert!(Settings::parse(r#"{"store": {"block_size": 0}}"#).is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("mailstore-settings-does-not-exist.json");
        let settings = Settings::load(&path).await.unwrap();
        assert_eq!(settings, Settings::default());
    }
}
