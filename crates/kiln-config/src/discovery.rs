//! File-based config discovery and layering.
//!
//! Finds the project configuration file and layers it between the built-in
//! defaults and `KILN_*` environment variables with figment.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use serde_json::Value;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

/// Default prefix for environment overrides (`KILN_BUILD__OUT_DIR=out`).
pub const ENV_PREFIX: &str = "KILN_";

/// File-based configuration discovery.
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigDiscovery {
    root: PathBuf,
    env_prefix: Option<String>,
}

impl ConfigDiscovery {
    /// Create a new config discovery with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Read environment overrides from a different prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore environment overrides entirely.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. kiln.toml
    /// 2. package.json (kiln field)
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join("kiln.toml");
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.exists() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get("kiln").is_some_and(|v| !v.is_null()) {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Load the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<KilnConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.load_from(&path)
    }

    /// Load the layered configuration, falling back to defaults plus
    /// environment when the project has no config file.
    pub fn load_or_default(&self) -> Result<KilnConfig> {
        match self.find() {
            Some(path) => self.load_from(&path),
            None => self.extract(Figment::new()),
        }
    }

    /// Load config with profile merging
    pub fn load_with_profile(&self, profile: &str) -> Result<KilnConfig> {
        self.load()?.materialize_profile(Some(profile))
    }

    /// Load config from a specific file path
    pub fn load_from(&self, path: &Path) -> Result<KilnConfig> {
        tracing::debug!(path = %path.display(), "loading configuration");

        let figment = if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            Figment::new().merge(Serialized::defaults(self.package_json_section(path)?))
        } else {
            Figment::new().merge(Toml::file(path))
        };

        self.extract(figment)
    }

    fn extract(&self, file_layer: Figment) -> Result<KilnConfig> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(KilnConfig::default()))
            .merge(file_layer);

        if let Some(prefix) = &self.env_prefix {
            figment = figment.merge(Env::prefixed(prefix).split("__"));
        }

        figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            hint: Some(e.to_string()),
        })
    }

    fn package_json_section(&self, path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;

        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "package.json".to_string(),
                hint: Some(format!("Invalid JSON: {e}")),
            })?;

        match parsed.get("kiln") {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(ConfigError::InvalidValue {
                field: "kiln".to_string(),
                hint: Some("Add a 'kiln' field to your package.json".to_string()),
            }),
        }
    }
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<KilnConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}

/// Discover and load config with a profile applied.
pub fn discover_with_profile(profile: &str) -> Result<KilnConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load_with_profile(profile)
}
