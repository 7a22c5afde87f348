//! Global configuration settings shared across profiles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub parallel_jobs: Option<usize>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}
