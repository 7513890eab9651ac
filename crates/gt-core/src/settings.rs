//! User settings persisted in the flat key-value store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::message::PageMessage;
use crate::storage::{KeyValueStore, StorageError};

/// Toggles exposed in the page menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSettings {
    pub hide_ads: bool,
    pub skip_intro: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            hide_ads: true,
            skip_intro: true,
        }
    }
}

/// One menu entry / storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    HideAds,
    SkipIntro,
}

impl SettingKey {
    pub const ALL: [SettingKey; 2] = [Self::HideAds, Self::SkipIntro];

    pub fn storage_key(self) -> &'static str {
        match self {
            Self::HideAds => "hideAds",
            Self::SkipIntro => "skipIntro",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HideAds => "Hide Ads",
            Self::SkipIntro => "Skip Intro",
        }
    }

    /// Parse a CLI-style name (`hide-ads`, `skip-intro`) or the storage key.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "hide-ads" | "hideAds" => Some(Self::HideAds),
            "skip-intro" | "skipIntro" => Some(Self::SkipIntro),
            _ => None,
        }
    }
}

impl UserSettings {
    pub fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::HideAds => self.hide_ads,
            SettingKey::SkipIntro => self.skip_intro,
        }
    }

    fn set(&mut self, key: SettingKey, enabled: bool) {
        match key {
            SettingKey::HideAds => self.hide_ads = enabled,
            SettingKey::SkipIntro => self.skip_intro = enabled,
        }
    }

    /// Flip `key` and return the message that tells the page scripts about it.
    pub fn toggle(&mut self, key: SettingKey) -> PageMessage {
        let enabled = !self.get(key);
        self.set(key, enabled);
        self.message_for(key)
    }

    /// Message announcing the current value of `key`.
    pub fn message_for(&self, key: SettingKey) -> PageMessage {
        match key {
            SettingKey::HideAds => PageMessage::AdsToggle {
                enabled: self.hide_ads,
            },
            SettingKey::SkipIntro => PageMessage::SkipToggle {
                enabled: self.skip_intro,
            },
        }
    }

    /// Read settings, keeping defaults for missing keys.
    pub fn try_load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let mut settings = Self::default();
        for key in SettingKey::ALL {
            match store.get(key.storage_key())? {
                Some(Value::Bool(enabled)) => settings.set(key, enabled),
                Some(other) => {
                    log::warn!("Ignoring non-boolean value {} for '{}'", other, key.storage_key());
                }
                None => {}
            }
        }
        Ok(settings)
    }

    /// Read settings, falling back to defaults when storage is unavailable.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match Self::try_load(store) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Storage unavailable, using default settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        for key in SettingKey::ALL {
            store.set(key.storage_key(), Value::Bool(self.get(key)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Value>, StorageError> {
            Err(StorageError::Unavailable("offline".to_string()))
        }

        fn set(&self, _key: &str, _value: Value) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::new();
        assert_eq!(UserSettings::load(&store), UserSettings::default());
    }

    #[test]
    fn test_partial_keys_merge_with_defaults() {
        let store = MemoryStore::new();
        store.set("skipIntro", json!(false)).unwrap();
        let settings = UserSettings::load(&store);
        assert!(settings.hide_ads);
        assert!(!settings.skip_intro);
    }

    #[test]
    fn test_unavailable_storage_falls_back() {
        assert_eq!(UserSettings::load(&BrokenStore), UserSettings::default());
        assert!(UserSettings::default().save(&BrokenStore).is_err());
    }

    #[test]
    fn test_toggle_and_save() {
        let store = MemoryStore::new();
        let mut settings = UserSettings::load(&store);

        let msg = settings.toggle(SettingKey::HideAds);
        assert_eq!(msg, PageMessage::AdsToggle { enabled: false });
        settings.save(&store).unwrap();

        let reloaded = UserSettings::load(&store);
        assert!(!reloaded.hide_ads);
        assert!(reloaded.skip_intro);

        let mut reloaded = reloaded;
        assert_eq!(
            reloaded.toggle(SettingKey::SkipIntro),
            PageMessage::SkipToggle { enabled: false }
        );
    }

    #[test]
    fn test_setting_key_names() {
        assert_eq!(SettingKey::parse("hide-ads"), Some(SettingKey::HideAds));
        assert_eq!(SettingKey::parse("skipIntro"), Some(SettingKey::SkipIntro));
        assert_eq!(SettingKey::parse("volume"), None);
        assert_eq!(SettingKey::SkipIntro.label(), "Skip Intro");
    }
}
