use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::Credentials;
use crate::types::Regulator;

pub const DEFAULT_INTERVAL_SECS: u64 = 30;
/// Polls are never scheduled more often than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Per-device settings as stored by the host platform.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettings {
    pub username: String,
    pub password: String,
    /// Poll interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub regulator: Regulator,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl DeviceSettings {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            username: credentials.username,
            password: credentials.password,
            interval: DEFAULT_INTERVAL_SECS,
            regulator: Regulator::default(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn poll_interval(&self) -> Duration {
        poll_interval(self.interval)
    }

    fn value_of(&self, key: SettingKey) -> String {
        match key {
            SettingKey::Username => self.username.clone(),
            SettingKey::Password => "<redacted>".to_string(),
            SettingKey::Interval => self.interval.to_string(),
            SettingKey::Regulator => self.regulator.as_vendor_str().to_string(),
        }
    }
}

impl fmt::Debug for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("interval", &self.interval)
            .field("regulator", &self.regulator)
            .finish()
    }
}

/// Clamp an interval in seconds to [`MIN_POLL_INTERVAL`].
pub fn poll_interval(secs: u64) -> Duration {
    Duration::from_secs(secs).max(MIN_POLL_INTERVAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Username,
    Password,
    Interval,
    Regulator,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::Username,
        SettingKey::Password,
        SettingKey::Interval,
        SettingKey::Regulator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Username => "username",
            SettingKey::Password => "password",
            SettingKey::Interval => "interval",
            SettingKey::Regulator => "regulator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// A settings update as delivered by the host: old values, new values and
/// the keys the user touched.
#[derive(Debug, Clone)]
pub struct SettingsChange {
    pub old: DeviceSettings,
    pub new: DeviceSettings,
    pub changed_keys: Vec<SettingKey>,
}

impl SettingsChange {
    /// Build a change by comparing every field.
    pub fn between(old: DeviceSettings, new: DeviceSettings) -> Self {
        let changed_keys = SettingKey::ALL
            .into_iter()
            .filter(|k| match k {
                SettingKey::Username => old.username != new.username,
                SettingKey::Password => old.password != new.password,
                SettingKey::Interval => old.interval != new.interval,
                SettingKey::Regulator => old.regulator != new.regulator,
            })
            .collect();
        Self {
            old,
            new,
            changed_keys,
        }
    }

    pub fn contains(&self, key: SettingKey) -> bool {
        self.changed_keys.contains(&key)
    }

    pub fn credentials_changed(&self) -> bool {
        self.contains(SettingKey::Username) || self.contains(SettingKey::Password)
    }

    /// Human readable `'key' 'old' => 'new'` lines. Credentials never appear.
    pub fn describe(&self) -> Vec<String> {
        self.changed_keys
            .iter()
            .filter(|k| !matches!(k, SettingKey::Username | SettingKey::Password))
            .map(|k| {
                format!(
                    "setting '{}' set '{}' => '{}'",
                    k.as_str(),
                    self.old.value_of(*k),
                    self.new.value_of(*k)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DeviceSettings {
        DeviceSettings::new(Credentials::new("me@example.com", "hunter2"))
    }

    #[test]
    fn interval_is_clamped_to_minimum() {
        assert_eq!(poll_interval(0), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval(5), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval(45), Duration::from_secs(45));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: DeviceSettings =
            serde_json::from_str(r#"{"username":"a","password":"b"}"#).unwrap();
        assert_eq!(s.interval, DEFAULT_INTERVAL_SECS);
        assert_eq!(s.regulator, Regulator::Floor);
    }

    #[test]
    fn change_detects_keys() {
        let old = settings();
        let mut new = old.clone();
        new.interval = 60;
        new.password = "secret".into();
        let change = SettingsChange::between(old, new);
        assert_eq!(change.changed_keys, vec![SettingKey::Password, SettingKey::Interval]);
        assert!(change.credentials_changed());
    }

    #[test]
    fn describe_never_mentions_credentials() {
        let old = settings();
        let mut new = old.clone();
        new.username = "other@example.com".into();
        new.password = "new-secret".into();
        new.regulator = Regulator::Room;
        let lines = SettingsChange::between(old, new).describe();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("temperatureRoom"));
        assert!(lines.iter().all(|l| !l.contains("secret") && !l.contains("hunter2")));
        assert!(lines.iter().all(|l| !l.contains("example.com")));
    }
}
