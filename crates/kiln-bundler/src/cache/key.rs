//! Content-addressed cache keys.
//!
//! A key is a tier tag plus a canonical hash of everything that tier's output
//! depends on, rendered as `"<tier>:<hex>"`. Identical inputs always map to
//! the same key, so invalidation needs no bookkeeping.

use std::str::FromStr;

use kiln_graph::{CanonicalHasher, ContentHash};
use serde::{Deserialize, Serialize};

/// Current cache format version. Increment when cache format changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Granularity of a cached result, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Whole build output for an input fingerprint.
    Input,
    /// Graph snapshot for a set of source hashes.
    Graph,
    /// Build plan for a graph hash and target.
    Plan,
    /// Transformed code of a single module.
    Artifact,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Input => "input",
            CacheTier::Graph => "graph",
            CacheTier::Plan => "plan",
            CacheTier::Artifact => "artifact",
        }
    }
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(CacheTier::Input),
            "graph" => Ok(CacheTier::Graph),
            "plan" => Ok(CacheTier::Plan),
            "artifact" => Ok(CacheTier::Artifact),
            other => Err(format!("unknown cache tier: {other}")),
        }
    }
}

/// Content-addressed cache key (`"<tier>:<hex>"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    tier: CacheTier,
    hash: ContentHash,
}

impl CacheKey {
    pub fn new(tier: CacheTier, hash: ContentHash) -> Self {
        Self { tier, hash }
    }

    /// Key for a tier derived from string parts, hashed in order.
    ///
    /// The format version is mixed in so an incompatible layout never
    /// reuses old entries.
    pub fn from_parts<'a>(tier: CacheTier, parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = CanonicalHasher::new();
        hasher.update_u64(u64::from(CACHE_FORMAT_VERSION));
        hasher.update_str(tier.as_str());
        for part in parts {
            hasher.update_str(part);
        }
        Self::new(tier, hasher.finish())
    }

    pub fn tier(&self) -> CacheTier {
        self.tier
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Parse the `"<tier>:<hex>"` form.
    pub fn parse(raw: &str) -> Option<Self> {
        let (tier, hex) = raw.split_once(':')?;
        let tier = tier.parse().ok()?;
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self::new(tier, ContentHash::from_hex(hex)))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tier, self.hash)
    }
}
