//! Ledger settings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

/// Settings that shape how subscribers are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether host user references take part in subscriber identity.
    ///
    /// When disabled, only email addresses identify subscribers.
    pub enable_user_sync: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_user_sync: true,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path is a directory, or an error
    /// if the file cannot be read or is not valid JSON.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }
        if tokio::fs::metadata(path).await?.is_dir() {
            return Err(Error::Config(format!(
                "{} is a directory, expected a settings file",
                path.display()
            )));
        }

        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save settings to a JSON file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json"))
            .await
            .unwrap();
        assert!(settings.enable_user_sync);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            enable_user_sync: false,
        };
        settings.save(&path).await.unwrap();

        assert_eq!(Settings::load(&path).await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_unknown_fields_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{"theme": "dark"}"#).await.unwrap();

        assert_eq!(Settings::load(&path).await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(matches!(
            Settings::load(&path).await,
            Err(Error::Serde(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load(dir.path()).await,
            Err(Error::Config(_))
        ));
    }
}
