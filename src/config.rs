//! Process configuration read from the environment (and `.env` via dotenvy).
//!
//! The bot token itself is picked up by `Bot::from_env` (`TELOXIDE_TOKEN`).

use std::{collections::HashSet, path::PathBuf};

use teloxide::types::UserId;

use crate::errors::{BotError, BotResult};

const DEFAULT_DATABASE_URL: &str = "sqlite:bot_database.db";
const DEFAULT_SETTINGS_PATH: &str = "settings.json";
const DEFAULT_SCRATCH_DIR: &str = "downloads";
const DEFAULT_EXPORT_DIR: &str = ".";
const DEFAULT_DOWNLOADER: &str = "yt-dlp";

#[derive(Debug, Clone)]
pub struct Config {
    /// Administrators allowed to use the admin panel
    pub admin_ids: HashSet<i64>,
    pub database_url: String,
    pub settings_path: PathBuf,
    /// Where fetched media lives until it's sent
    pub scratch_dir: PathBuf,
    /// Where export documents are written before being sent
    pub export_dir: PathBuf,
    /// yt-dlp executable
    pub downloader: String,
}

impl Config {
    pub fn from_env() -> BotResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BotResult<Self> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let admin_ids = match lookup("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => {
                log::warn!("ADMIN_IDS is not set, admin panel is disabled");
                HashSet::new()
            }
        };

        Ok(Self {
            admin_ids,
            database_url: get("DATABASE_URL", DEFAULT_DATABASE_URL),
            settings_path: PathBuf::from(get("SETTINGS_PATH", DEFAULT_SETTINGS_PATH)),
            scratch_dir: PathBuf::from(get("SCRATCH_DIR", DEFAULT_SCRATCH_DIR)),
            export_dir: PathBuf::from(get("EXPORT_DIR", DEFAULT_EXPORT_DIR)),
            downloader: get("YTDLP_PATH", DEFAULT_DOWNLOADER),
        })
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&(user_id.0 as i64))
    }
}

/// Parse a comma separated list like `"123, 456"`
pub fn parse_admin_ids(raw: &str) -> BotResult<HashSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| BotError::invalid_config(format!("ADMIN_IDS: '{}' is not a number", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_admin_ids_with_spaces() {
        let ids = parse_admin_ids(" 1, 22 ,333,").unwrap();
        assert_eq!(ids, HashSet::from([1, 22, 333]));
    }

    #[test]
    fn rejects_non_numeric_admin_id() {
        assert!(matches!(
            parse_admin_ids("1,abc"),
            Err(BotError::InvalidConfig(_))
        ));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.scratch_dir, PathBuf::from("downloads"));
        assert_eq!(config.downloader, "yt-dlp");
    }

    #[test]
    fn admin_check_uses_allow_list() {
        let config = Config::from_lookup(lookup_from(&[
            ("ADMIN_IDS", "42"),
            ("SCRATCH_DIR", "/tmp/media"),
        ]))
        .unwrap();
        assert!(config.is_admin(UserId(42)));
        assert!(!config.is_admin(UserId(43)));
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp/media"));
    }
}
