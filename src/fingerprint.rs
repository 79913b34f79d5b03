//! # Config Fingerprint Module
//!
//! Proiezione delle impostazioni che influenzano l'output compresso in uno
//! snapshot confrontabile, salvato dentro il record di cache.
//!
//! ## Responsabilità:
//! - Definisce l'insieme fisso di chiavi riconosciute (qualità, limiti di resize,
//!   parametri codec, flag di skip)
//! - Uguaglianza chiave per chiave, indipendente dall'ordine
//! - Serializzazione deterministica (mappa ordinata) per il salvataggio
//! - Elenco delle chiavi diverse, per il log di invalidazione

use crate::config::Config;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Settings whose value changes compressed output.
pub const RECOGNIZED_KEYS: [&str; 8] = [
    "image_quality",
    "image_max_width",
    "image_max_height",
    "video_crf",
    "video_preset",
    "video_max_width",
    "skip_images",
    "skip_videos",
];

/// Ordered setting-name → value mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSnapshot(BTreeMap<String, Value>);

impl ConfigSnapshot {
    /// Projects `config` onto [`RECOGNIZED_KEYS`].
    pub fn from_settings(config: &Config) -> Self {
        let mut values = BTreeMap::new();
        values.insert("image_quality".to_string(), Value::from(config.image_quality));
        values.insert("image_max_width".to_string(), Value::from(config.image_max_width));
        values.insert("image_max_height".to_string(), Value::from(config.image_max_height));
        values.insert("video_crf".to_string(), Value::from(config.video_crf));
        values.insert("video_preset".to_string(), Value::from(config.video_preset.clone()));
        values.insert("video_max_width".to_string(), Value::from(config.video_max_width));
        values.insert("skip_images".to_string(), Value::from(config.skip_images));
        values.insert("skip_videos".to_string(), Value::from(config.skip_videos));
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Recognized keys whose values differ, `self` being the stored side.
    pub fn differences(&self, current: &Self) -> Vec<SnapshotChange> {
        RECOGNIZED_KEYS
            .iter()
            .filter_map(|&key| {
                let old = self.0.get(key);
                let new = current.0.get(key);
                (old != new).then(|| SnapshotChange {
                    key,
                    old: old.cloned(),
                    new: new.cloned(),
                })
            })
            .collect()
    }
}

impl PartialEq for ConfigSnapshot {
    fn eq(&self, other: &Self) -> bool {
        RECOGNIZED_KEYS
            .iter()
            .all(|&key| self.0.get(key) == other.0.get(key))
    }
}

impl Eq for ConfigSnapshot {}

/// One differing key between a stored and a current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotChange {
    pub key: &'static str,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl fmt::Display for SnapshotChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(value: &Option<Value>) -> String {
            match value {
                None => "<missing>".to_string(),
                Some(v) => v.to_string(),
            }
        }
        write!(f, "{}: {} → {}", self.key, show(&self.old), show(&self.new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_covers_recognized_keys() {
        let snapshot = ConfigSnapshot::from_settings(&Config::default());
        for key in RECOGNIZED_KEYS {
            assert!(snapshot.get(key).is_some(), "missing {key}");
        }
        assert_eq!(snapshot.get("image_quality"), Some(&Value::from(85)));
        assert_eq!(snapshot.get("image_max_width"), Some(&Value::Null));
    }

    #[test]
    fn test_non_output_settings_do_not_change_snapshot() {
        let base = Config::default();
        let other = Config {
            workers: 16,
            json_output: true,
            ..Config::default()
        };
        assert_eq!(
            ConfigSnapshot::from_settings(&base),
            ConfigSnapshot::from_settings(&other)
        );
    }

    #[test]
    fn test_differences_lists_changed_keys() {
        let old = ConfigSnapshot::from_settings(&Config::default());
        let new = ConfigSnapshot::from_settings(&Config {
            image_quality: 70,
            video_max_width: Some(1280),
            ..Config::default()
        });

        assert_ne!(old, new);
        let changes = old.differences(&new);
        let keys: Vec<_> = changes.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["image_quality", "video_max_width"]);
        assert_eq!(changes[0].to_string(), "image_quality: 85 → 70");
        assert_eq!(changes[1].to_string(), "video_max_width: null → 1280");
    }

    #[test]
    fn test_serialization_is_ordered_and_unknown_keys_ignored() {
        let snapshot = ConfigSnapshot::from_settings(&Config::default());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.find("image_max_height").unwrap() < json.find("video_crf").unwrap());

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["legacy_flag"] = Value::from(true);
        let stored: ConfigSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(stored, snapshot);
    }

    #[test]
    fn test_missing_key_is_a_difference() {
        let current = ConfigSnapshot::from_settings(&Config::default());
        let mut stored = current.clone();
        stored.0.remove("skip_videos");
        assert_ne!(stored, current);
        assert_eq!(stored.differences(&current)[0].to_string(), "skip_videos: <missing> → false");
    }
}
