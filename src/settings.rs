use crate::db::Database;
use crate::models::QueryParams;
use crate::remote::RemoteConfig;
use crate::session::{ChatConfig, SyncConfig};
use std::collections::BTreeMap;
use std::time::Duration;

pub const SETTING_KEYS: &[&str] = &[
    "server_url",
    "max_results",
    "similarity_threshold",
    "accepted_extension",
    "query_max_chars",
    "status_poll_secs",
    "request_timeout_secs",
];

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// Client configuration, stored in the `settings` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub max_results: usize,
    pub similarity_threshold: f32,
    pub accepted_extension: String,
    pub query_max_chars: usize,
    pub status_poll_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            max_results: 5,
            similarity_threshold: 0.7,
            accepted_extension: ".txt".to_string(),
            query_max_chars: 1000,
            status_poll_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

impl ClientSettings {
    /// Read every known key, falling back to the default for missing ones.
    pub fn load(db: &Database) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        for key in SETTING_KEYS {
            if let Some(value) = db.get_setting(key)? {
                settings.apply(key, &value)?;
            }
        }
        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            "server_url" => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(invalid(key, "must start with http:// or https://"));
                }
                self.server_url = value.trim_end_matches('/').to_string();
            }
            "max_results" => {
                self.max_results = parse_in_range(key, value, 1, 20)?;
            }
            "similarity_threshold" => {
                let threshold: f32 = value.parse().map_err(|_| invalid(key, "not a number"))?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(invalid(key, "must be between 0 and 1"));
                }
                self.similarity_threshold = threshold;
            }
            "accepted_extension" => {
                if !value.starts_with('.') || value.len() < 2 {
                    return Err(invalid(key, "must look like .txt"));
                }
                self.accepted_extension = value.to_string();
            }
            "query_max_chars" => {
                self.query_max_chars = parse_in_range(key, value, 1, 100_000)?;
            }
            "status_poll_secs" => {
                self.status_poll_secs = parse_in_range(key, value, 1, 86_400)?;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = parse_in_range(key, value, 1, 3_600)?;
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Effective value of `key` as it would be stored, `None` for unknown keys.
    pub fn value_of(&self, key: &str) -> Option<String> {
        let value = match key {
            "server_url" => self.server_url.clone(),
            "max_results" => self.max_results.to_string(),
            "similarity_threshold" => self.similarity_threshold.to_string(),
            "accepted_extension" => self.accepted_extension.clone(),
            "query_max_chars" => self.query_max_chars.to_string(),
            "status_poll_secs" => self.status_poll_secs.to_string(),
            "request_timeout_secs" => self.request_timeout_secs.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Override the server for this run only; nothing is stored.
    pub fn with_server_url(mut self, url: &str) -> Result<Self, SettingsError> {
        self.apply("server_url", url)?;
        Ok(self)
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.server_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            params: QueryParams {
                result_cap: self.max_results,
                similarity_threshold: self.similarity_threshold,
            },
            max_query_chars: self.query_max_chars,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            accepted_extension: self.accepted_extension.clone(),
        }
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_secs)
    }
}

fn invalid(key: &str, message: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_in_range<T>(key: &str, value: &str, min: T, max: T) -> Result<T, SettingsError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    let parsed: T = value.parse().map_err(|_| invalid(key, "not a number"))?;
    if parsed < min || parsed > max {
        return Err(invalid(key, &format!("must be between {} and {}", min, max)));
    }
    Ok(parsed)
}

/// Validate and store a setting.
pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), SettingsError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(SettingsError::UnknownKey(key.to_string()));
    }
    ClientSettings::default().apply(key, value)?;
    db.set_setting(key, value.trim())?;
    Ok(())
}

pub fn delete_setting(db: &Database, key: &str) -> Result<(), SettingsError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(SettingsError::UnknownKey(key.to_string()));
    }
    db.delete_setting(key)?;
    Ok(())
}

/// Every known key with its effective value; `true` marks explicitly stored ones.
pub fn get_settings(db: &Database) -> Result<BTreeMap<String, (String, bool)>, SettingsError> {
    let stored = db.all_settings()?;
    let effective = ClientSettings::load(db)?;
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        let value = effective
            .value_of(key)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        map.insert(key.to_string(), (value, stored.contains_key(*key)));
    }
    Ok(map)
}
