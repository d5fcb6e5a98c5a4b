//! Persisted operator settings.
//!
//! A JSON document holding the node URL, wallet seed, Discord hook settings,
//! and the last collection used per marketplace. Read at startup and
//! rewritten whenever a collection is resolved or a setting changes.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{CollectionInfo, Marketplace};

/// Default settings file path.
pub const DEFAULT_SETTINGS_FILE: &str = "mercury.json";

/// Node URL written into a freshly created settings file.
pub const DEFAULT_NODE_URL: &str = "https://fullnode.mainnet.aptoslabs.com/v1";

/// Startup problems with the settings document. All are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("created {0}: fill in aptos_private_key and discord_hook.hook, then restart")]
    Created(String),

    #[error("aptos_node_url is empty")]
    MissingNodeUrl,

    #[error("aptos_private_key is empty")]
    MissingPrivateKey,

    #[error("discord hook not found")]
    MissingDiscordHook,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordSettings {
    #[serde(default)]
    pub send_fail: bool,
    #[serde(default)]
    pub hook: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCollections {
    #[serde(default)]
    pub topaz: CollectionInfo,
    #[serde(default)]
    pub bluemove: CollectionInfo,
}

impl LastCollections {
    pub fn get(&self, marketplace: Marketplace) -> &CollectionInfo {
        match marketplace {
            Marketplace::Topaz => &self.topaz,
            Marketplace::BlueMove => &self.bluemove,
        }
    }

    pub fn set(&mut self, marketplace: Marketplace, info: CollectionInfo) {
        match marketplace {
            Marketplace::Topaz => self.topaz = info,
            Marketplace::BlueMove => self.bluemove = info,
        }
    }
}

/// The settings document. Field names match the on-disk schema.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "aptos_node_url", default)]
    pub node_url: String,
    #[serde(rename = "aptos_private_key", default)]
    pub private_key: String,
    #[serde(rename = "discord_hook", default)]
    pub discord: DiscordSettings,
    #[serde(rename = "last_run_collection", default)]
    pub collections: LastCollections,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("node_url", &self.node_url)
            .field("private_key", &"[REDACTED]")
            .field("discord", &self.discord)
            .field("collections", &self.collections)
            .finish()
    }
}

impl Settings {
    /// The document written on first run.
    pub fn template() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            ..Self::default()
        }
    }

    /// Check the fields required before the sniper may start.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.node_url.trim().is_empty() {
            return Err(SettingsError::MissingNodeUrl);
        }
        if self.private_key.trim().is_empty() {
            return Err(SettingsError::MissingPrivateKey);
        }
        if self.discord.hook.trim().is_empty() {
            return Err(SettingsError::MissingDiscordHook);
        }
        Ok(())
    }

    pub fn private_key(&self) -> SecretString {
        SecretString::new(self.private_key.clone())
    }

    /// The last collection sniped on `marketplace`, if fully resolved.
    pub fn last_collection(&self, marketplace: Marketplace) -> Option<&CollectionInfo> {
        Some(self.collections.get(marketplace)).filter(|c| c.is_complete())
    }

    pub fn remember_collection(&mut self, marketplace: Marketplace, info: CollectionInfo) {
        self.collections.set(marketplace, info);
    }
}

/// Save settings as pretty JSON.
pub fn save_settings(settings: &Settings, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_SETTINGS_FILE);
    let json = serde_json::to_string_pretty(settings)
        .context("Failed to serialise settings")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write settings to {path}"))?;

    debug!(path, "Settings saved");
    Ok(())
}

/// Load settings from disk.
///
/// A missing file is replaced by the template and reported as
/// `SettingsError::Created`, since the operator has to fill it in first.
pub fn load_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(DEFAULT_SETTINGS_FILE);

    if !Path::new(path).exists() {
        save_settings(&Settings::template(), Some(path))?;
        info!(path, "Settings template created");
        return Err(SettingsError::Created(path.to_string()).into());
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read settings from {path}"))?;

    let settings: Settings = serde_json::from_str(&json)
        .context(format!("Failed to parse settings from {path}"))?;

    debug!(path, node = %settings.node_url, "Settings loaded");
    Ok(settings)
}

/// Delete the settings file (for testing or reset).
pub fn delete_settings(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_SETTINGS_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete settings file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
