//! High-level configuration structure for kiln.
//!
//! This module provides the main `KilnConfig` struct and profile merging
//! logic. For file discovery and layering, see the `discovery` module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build::{BuildConfig, CacheConfig};
use crate::dev::DevConfig;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::settings::GlobalSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub dev: DevConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    #[serde(default)]
    pub settings: GlobalSettings,
}

/// Partial overrides merged over the base configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub build: Value,

    #[serde(default)]
    pub dev: Value,

    #[serde(default)]
    pub cache: Value,

    #[serde(default)]
    pub settings: Value,
}

impl KilnConfig {
    /// Create from a `serde_json::Value` (programmatic configuration).
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_config::{KilnConfig, Target};
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let config = KilnConfig::from_value(json!({
    ///     "build": { "entries": ["src/main.ts"], "target": "node" }
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(config.build.entries, vec![PathBuf::from("src/main.ts")]);
    /// assert_eq!(config.build.target, Target::Node);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Merge the named profile over the base sections.
    ///
    /// Objects merge key by key; arrays and scalars in the profile replace the
    /// base value.
    pub fn materialize_profile(mut self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };
        let profile_cfg = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        self.build = merge_section(&self.build, &profile_cfg.build)?;
        self.dev = merge_section(&self.dev, &profile_cfg.dev)?;
        self.cache = merge_section(&self.cache, &profile_cfg.cache)?;
        self.settings = merge_section(&self.settings, &profile_cfg.settings)?;

        tracing::debug!(profile = name, "applied configuration profile");
        Ok(self)
    }
}

fn merge_section<T>(base: &T, overrides: &Value) -> ConfigResult<T>
where
    T: Serialize + serde::de::DeserializeOwned + Clone,
{
    if overrides.is_null() {
        return Ok(base.clone());
    }
    let mut value = serde_json::to_value(base).map_err(|err| {
        ConfigError::InvalidProfileOverride {
            message: err.to_string(),
        }
    })?;
    merge_values(&mut value, overrides);
    serde_json::from_value(value).map_err(|err| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    })
}

pub(crate) fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{Mode, Target};
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn from_value_applies_defaults() {
        let config = KilnConfig::from_value(json!({
            "build": { "entries": ["index.ts"] }
        }))
        .unwrap();

        assert_eq!(config.build.out_dir, PathBuf::from("dist"));
        assert_eq!(config.build.target, Target::Browser);
        assert!(config.cache.enabled);
        assert_eq!(config.dev.debounce_ms, 100);
    }

    #[test]
    fn to_value_serializes_config() {
        let mut config = KilnConfig::default();
        config.build.mode = Mode::Production;
        let value = config.to_value().unwrap();
        assert_eq!(value["build"]["mode"], json!("production"));
    }

    #[test]
    fn profile_merging_works() {
        let config = KilnConfig::from_value(json!({
            "build": { "entries": ["index.ts"], "mode": "development", "target": "browser" },
            "cache": { "enabled": true },
            "profiles": {
                "production": {
                    "build": { "mode": "production" },
                    "cache": { "enabled": false }
                }
            }
        }))
        .unwrap()
        .materialize_profile(Some("production"))
        .unwrap();

        assert_eq!(config.build.mode, Mode::Production);
        assert_eq!(config.build.target, Target::Browser);
        assert_eq!(config.build.entries, vec![PathBuf::from("index.ts")]);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = KilnConfig::default()
            .materialize_profile(Some("staging"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "staging"));
    }

    #[test]
    fn bad_override_is_reported() {
        let err = KilnConfig::from_value(json!({
            "profiles": { "p": { "build": { "target": "mars" } } }
        }))
        .unwrap()
        .materialize_profile(Some("p"))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProfileOverride { .. }));
    }
}
