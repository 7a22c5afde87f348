//! Development session configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevConfig {
    /// Quiet period before a batch of file events is processed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Path fragments ignored by the watcher.
    #[serde(default = "default_watch_ignore")]
    pub watch_ignore: Vec<String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            watch_ignore: default_watch_ignore(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_watch_ignore() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        ".git".to_string(),
        ".kiln".to_string(),
    ]
}
