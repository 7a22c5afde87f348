//! # kiln-config
//!
//! Configuration model for the kiln build engine.
//!
//! Configuration is layered with figment: built-in defaults, then the
//! project file (`kiln.toml`, or the `kiln` field of `package.json`), then
//! `KILN_*` environment variables. A named profile can then be merged over
//! the result.

pub mod build;
pub mod config;
pub mod dev;
pub mod discovery;
pub mod error;
pub mod settings;
pub mod validation;

pub use build::{BuildConfig, CacheConfig, Mode, Target};
pub use config::{KilnConfig, ProfileConfig};
pub use dev::DevConfig;
pub use discovery::{ConfigDiscovery, discover, discover_with_profile};
pub use error::{ConfigError, Result};
pub use settings::GlobalSettings;
pub use validation::validate;
