//! Runtime settings stored as a JSON file next to the bot.
//!
//! Plain string values live at the top level of the document, the list of
//! channels a user has to join lives under `required_channels`. The file is
//! rewritten every time an admin changes a value.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tokio::{fs, sync::Mutex};

use crate::errors::{BotError, BotResult};

pub const OWNER_URL: &str = "owner_url";
pub const PRODUCT_URL: &str = "product_url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredChannel {
    /// Numeric chat id (`-100...`) or public `@username`
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Keys an admin can change from the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum SettingKey {
    #[strum(serialize = "channel_id")]
    ChannelId,
    #[strum(serialize = "channel_url")]
    ChannelUrl,
}

/// Channels a fresh deploy gates on until the settings file says otherwise
const DEFAULT_CHANNELS: &[(&str, &str, &str)] = &[
    (
        "-1002397757887",
        "НАРОД | Робота Київ🇺🇦",
        "https://t.me/+vPRsg7xEfb4yZWEy",
    ),
    (
        "-1002400023551",
        "НАРОД | Віддалена робота🇺🇦",
        "https://t.me/+lB3HA50hyLIxNGNi",
    ),
    (
        "-1002649530761",
        "НАРОД | Робота Вишневе🇺🇦",
        "https://t.me/+GfUSmrF1tLwyMGQ6",
    ),
];

fn default_channels() -> Vec<RequiredChannel> {
    DEFAULT_CHANNELS
        .iter()
        .map(|&(id, name, url)| RequiredChannel {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_channels")]
    pub required_channels: Vec<RequiredChannel>,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            required_channels: default_channels(),
            values: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn to_pretty_json(&self) -> BotResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Load settings from `path`, creating the file with defaults if it's missing
    pub async fn load(path: impl Into<PathBuf>) -> BotResult<Self> {
        let path = path.into();

        let settings = if fs::try_exists(&path).await? {
            let raw = fs::read_to_string(&path).await?;
            serde_json::from_str(&raw)?
        } else {
            log::warn!(
                "Settings file {} not found, creating one with the default channels",
                path.display()
            );
            let settings = Settings::default();
            write_settings(&path, &settings).await?;
            settings
        };

        // an empty list would let everyone through the gate
        if settings.required_channels.is_empty() {
            return Err(BotError::invalid_config(format!(
                "{}: required_channels is empty",
                path.display()
            )));
        }

        log::info!(
            "Loaded settings from {} ({} required channels)",
            path.display(),
            settings.required_channels.len()
        );

        Ok(Self {
            path,
            current: Mutex::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Settings {
        self.current.lock().await.clone()
    }

    pub async fn required_channels(&self) -> Vec<RequiredChannel> {
        self.current.lock().await.required_channels.clone()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.current.lock().await.get(key).map(str::to_string)
    }

    /// Change a value and persist the whole document.
    /// The in-memory copy only changes once the file was written.
    pub async fn set(&self, key: SettingKey, value: &str) -> BotResult<()> {
        let mut current = self.current.lock().await;

        let mut updated = current.clone();
        updated
            .values
            .insert(key.as_ref().to_string(), value.trim().to_string());
        write_settings(&self.path, &updated).await?;

        *current = updated;
        log::info!("Setting {} changed", key);
        Ok(())
    }
}

async fn write_settings(path: &Path, settings: &Settings) -> BotResult<()> {
    fs::write(path, settings.to_pretty_json()?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const SAMPLE: &str = r#"{
        "channel_id": "-1001",
        "channel_url": "https://t.me/example",
        "required_channels": [
            {"id": "-1002", "name": "News", "url": "https://t.me/+news"}
        ]
    }"#;

    #[tokio::test]
    async fn loads_values_and_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = SettingsStore::load(&path).await.unwrap();
        assert_eq!(store.get("channel_id").await.as_deref(), Some("-1001"));
        assert_eq!(
            store.required_channels().await,
            vec![RequiredChannel {
                id: "-1002".into(),
                name: "News".into(),
                url: "https://t.me/+news".into(),
            }]
        );
    }

    #[tokio::test]
    async fn creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::load(&path).await.unwrap();
        assert!(path.exists());
        let channels = store.required_channels().await;
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].id, "-1002397757887");

        // the written file carries the same channels
        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert_eq!(reloaded.required_channels().await, channels);
    }

    #[tokio::test]
    async fn file_without_channel_list_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"channel_id": "-1001"}"#).unwrap();

        let store = SettingsStore::load(&path).await.unwrap();
        assert_eq!(store.required_channels().await.len(), 3);
    }

    #[tokio::test]
    async fn empty_channel_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"required_channels": []}"#).unwrap();

        match SettingsStore::load(&path).await {
            Err(BotError::InvalidConfig(msg)) => assert!(msg.contains("required_channels")),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("empty channel list accepted"),
        }
    }

    #[tokio::test]
    async fn set_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = SettingsStore::load(&path).await.unwrap();
        store
            .set(SettingKey::ChannelUrl, " https://t.me/other ")
            .await
            .unwrap();

        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert_eq!(
            reloaded.get("channel_url").await.as_deref(),
            Some("https://t.me/other")
        );
        // untouched parts survive the rewrite
        assert_eq!(reloaded.required_channels().await.len(), 1);
        assert_eq!(reloaded.get("channel_id").await.as_deref(), Some("-1001"));
    }

    #[test]
    fn setting_keys_match_file_keys() {
        assert_eq!(SettingKey::ChannelId.as_ref(), "channel_id");
        assert_eq!(
            SettingKey::from_str("channel_url").unwrap(),
            SettingKey::ChannelUrl
        );
    }
}
