use std::fmt;

use serde::{Deserialize, Serialize};

use crate::module::ModuleKind;

/// Stable module identity.
///
/// Derived from the module kind and its root-relative normalized path, so the
/// same project yields the same ids on every machine and in every checkout
/// location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Number of hex characters kept from the digest.
    pub const LEN: usize = 16;

    /// Compute the id of a module from its kind and root-relative path.
    pub fn new(kind: ModuleKind, relative_path: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(relative_path.as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(hex[..Self::LEN].to_string())
    }

    /// Rehydrate an id that was previously rendered with [`ModuleId::as_str`].
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{normalize_path_from, relative_to_root};

    #[test]
    fn test_id_is_stable_across_roots() {
        let a = normalize_path_from("/", "/home/a/project/src/main.ts");
        let b = normalize_path_from("/", "C:\\ci\\project\\src\\main.ts");
        let id_a = ModuleId::new(ModuleKind::File, &relative_to_root("/home/a/project", &a));
        let id_b = ModuleId::new(ModuleKind::File, &relative_to_root("c:/ci/project", &b));
        assert_eq!(id_a, id_b);
        assert_eq!(id_a.as_str().len(), ModuleId::LEN);
    }

    #[test]
    fn test_kind_participates_in_id() {
        assert_ne!(
            ModuleId::new(ModuleKind::Css, "a.css"),
            ModuleId::new(ModuleKind::StyleAsset, "a.css")
        );
    }
}
