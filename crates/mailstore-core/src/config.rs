//! Store configuration, loaded from JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::DefaultSlot;
use crate::{Error, Result};

/// Names used when default folders have to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderNames {
    /// Drafts folder name.
    pub drafts: String,
    /// Sent folder name.
    pub sent: String,
    /// Trash folder name.
    pub trash: String,
    /// Spam folder name.
    pub spam: String,
    /// Confirmed spam folder name.
    pub confirmed_spam: String,
    /// Confirmed ham folder name.
    pub confirmed_ham: String,
}

impl Default for FolderNames {
    fn default() -> Self {
        Self {
            drafts: DefaultSlot::Drafts.canonical_name().to_string(),
            sent: DefaultSlot::Sent.canonical_name().to_string(),
            trash: DefaultSlot::Trash.canonical_name().to_string(),
            spam: DefaultSlot::Spam.canonical_name().to_string(),
            confirmed_spam: DefaultSlot::ConfirmedSpam.canonical_name().to_string(),
            confirmed_ham: DefaultSlot::ConfirmedHam.canonical_name().to_string(),
        }
    }
}

impl FolderNames {
    /// The name for a slot. INBOX is fixed.
    #[must_use]
    pub fn get(&self, slot: DefaultSlot) -> &str {
        match slot {
            DefaultSlot::Inbox => "INBOX",
            DefaultSlot::Drafts => &self.drafts,
            DefaultSlot::Sent => &self.sent,
            DefaultSlot::Trash => &self.trash,
            DefaultSlot::Spam => &self.spam,
            DefaultSlot::ConfirmedSpam => &self.confirmed_spam,
            DefaultSlot::ConfirmedHam => &self.confirmed_ham,
        }
    }
}

/// Storage layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of UIDs per COPY/MOVE/STORE/EXPUNGE command.
    pub block_size: usize,
    /// Deadline for one command, in seconds.
    pub command_timeout_secs: u64,
    /// Deadline for acquiring the connection, in seconds.
    pub lock_timeout_secs: u64,
    /// Deadline for checking one default folder, in seconds.
    pub default_folder_timeout_secs: u64,
    /// Honour ACLs when the server supports them.
    pub enforce_acls: bool,
    /// Names for default folders.
    pub folder_names: FolderNames,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            block_size: 1000,
            command_timeout_secs: 60,
            lock_timeout_secs: 30,
            default_folder_timeout_secs: 30,
            enforce_acls: true,
            folder_names: FolderNames::default(),
        }
    }
}

impl StoreConfig {
    /// Parses and validates a JSON document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads [`Self::from_json`] from a file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::configuration("block_size must be positive"));
        }
        if self.command_timeout_secs == 0 || self.lock_timeout_secs == 0 {
            return Err(Error::configuration("timeouts must be positive"));
        }
        for slot in DefaultSlot::ALL {
            if self.folder_names.get(slot).trim().is_empty() {
                return Err(Error::configuration(format!(
                    "folder name for {slot} is empty"
                )));
            }
        }
        Ok(())
    }

    /// [`Self::command_timeout_secs`] as a duration.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// [`Self::lock_timeout_secs`] as a duration.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// [`Self::default_folder_timeout_secs`] as a duration.
    #[must_use]
    pub const fn default_folder_timeout(&self) -> Duration {
        Duration::from_secs(self.default_folder_timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn empty_document_uses_defaults() {
        let config = StoreConfig::from_json("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.block_size, 1000);
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_folder_names() {
        let config =
            StoreConfig::from_json(r#"{"block_size": 50, "folder_names": {"trash": "Deleted"}}"#)
                .unwrap();
        assert_eq!(config.block_size, 50);
        assert_eq!(config.folder_names.get(DefaultSlot::Trash), "Deleted");
        assert_eq!(config.folder_names.get(DefaultSlot::Sent), "Sent");
        assert_eq!(config.folder_names.get(DefaultSlot::Inbox), "INBOX");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = StoreConfig::from_json(r#"{"block_size": 0}"#).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Configuration { .. }));

        let err = StoreConfig::from_json(r#"{"folder_names": {"sent": " "}}"#).unwrap_err();
        assert!(err.to_string().contains("sent"));

        assert!(StoreConfig::from_json("not json").is_err());
    }
}
