//! Build section of the configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Environment the output is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Browser,
    Node,
    Edge,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Browser => "browser",
            Target::Node => "node",
            Target::Edge => "edge",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" | "web" => Ok(Target::Browser),
            "node" => Ok(Target::Node),
            "edge" | "worker" => Ok(Target::Edge),
            other => Err(format!("Invalid target: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("Invalid mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub entries: Vec<PathBuf>,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    #[serde(default)]
    pub target: Target,

    #[serde(default)]
    pub mode: Mode,

    /// Cascade layer order; `None` keeps `base < components < utilities`.
    #[serde(default)]
    pub css_layers: Option<Vec<String>>,

    /// In-memory modules keyed by `virtual:*` id.
    #[serde(default)]
    pub virtual_files: BTreeMap<String, String>,

    /// Chunks executed concurrently; defaults to the number of CPUs.
    #[serde(default)]
    pub max_parallel_chunks: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            out_dir: default_out_dir(),
            target: Target::default(),
            mode: Mode::default(),
            css_layers: None,
            virtual_files: BTreeMap::new(),
            max_parallel_chunks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for the persistent store, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Skip cache reads; results are still written.
    #[serde(default)]
    pub force_rebuild: bool,

    /// Environment variables whose values participate in cache keys.
    #[serde(default)]
    pub env_vars: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            force_rebuild: false,
            env_vars: Vec::new(),
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".kiln/cache")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing() {
        assert_eq!("Node".parse::<Target>().unwrap(), Target::Node);
        assert_eq!("worker".parse::<Target>().unwrap(), Target::Edge);
        assert!("deno".parse::<Target>().is_err());
        assert_eq!(Target::Browser.to_string(), "browser");
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("prod".parse::<Mode>().unwrap(), Mode::Production);
        assert_eq!(Mode::Development.to_string(), "development");
    }
}
