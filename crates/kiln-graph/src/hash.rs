//! Canonical content hashing.
//!
//! Every identity the engine persists or compares (input, graph, plan,
//! artifact and export-shape hashes) goes through [`canonical_hash`]. Values
//! are first lowered to a JSON tree and then fed to BLAKE3 with object keys
//! sorted at every depth, so the construction order of maps and structs never
//! leaks into a hash.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors produced while hashing a value.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The value could not be lowered to a canonical tree.
    #[error("value is not canonically serializable: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Hex-encoded BLAKE3 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an existing hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, used in output file names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash raw bytes (file contents, emitted code).
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash(blake3::hash(bytes).to_hex().to_string())
}

/// Hash any serializable value canonically.
///
/// Two values that serialize to the same logical tree hash equal, whether
/// their maps were `HashMap`s or `BTreeMap`s and whatever order their keys
/// were inserted in.
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash, HashError> {
    let mut hasher = CanonicalHasher::new();
    hasher.update_serialize(value)?;
    Ok(hasher.finish())
}

/// Incremental canonical hasher for composite hashes.
///
/// Each `update_*` call appends one tagged, length-prefixed item, so
/// `["ab", "c"]` and `["a", "bc"]` never collide.
#[derive(Debug, Clone, Default)]
pub struct CanonicalHasher {
    inner: Hasher,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_str(&mut self, value: &str) -> &mut Self {
        self.inner.update(b"s");
        self.write_len(value.len());
        self.inner.update(value.as_bytes());
        self
    }

    pub fn update_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.inner.update(b"b");
        self.write_len(value.len());
        self.inner.update(value);
        self
    }

    pub fn update_bool(&mut self, value: bool) -> &mut Self {
        self.inner.update(if value { b"t" } else { b"f" });
        self
    }

    pub fn update_u64(&mut self, value: u64) -> &mut Self {
        self.inner.update(b"u");
        self.inner.update(&value.to_le_bytes());
        self
    }

    /// Append a serializable value in canonical form.
    pub fn update_serialize<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<&mut Self, HashError> {
        let tree = serde_json::to_value(value)?;
        self.update_value(&tree);
        Ok(self)
    }

    /// Append a JSON tree with keys sorted at every depth.
    pub fn update_value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Null => {
                self.inner.update(b"n");
            }
            Value::Bool(b) => {
                self.update_bool(*b);
            }
            Value::Number(n) => {
                let text = n.to_string();
                self.inner.update(b"#");
                self.write_len(text.len());
                self.inner.update(text.as_bytes());
            }
            Value::String(s) => {
                self.update_str(s);
            }
            Value::Array(items) => {
                self.inner.update(b"[");
                self.write_len(items.len());
                for item in items {
                    self.update_value(item);
                }
            }
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                self.inner.update(b"{");
                self.write_len(keys.len());
                for key in keys {
                    self.update_str(key);
                    self.update_value(&map[key.as_str()]);
                }
            }
        }
        self
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(self.inner.finalize().to_hex().to_string())
    }

    fn write_len(&mut self, len: usize) {
        self.inner.update(&(len as u64).to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_map_order_does_not_matter() {
        let mut a = HashMap::new();
        a.insert("zeta", 1);
        a.insert("alpha", 2);
        let mut b = BTreeMap::new();
        b.insert("alpha", 2);
        b.insert("zeta", 1);
        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn test_struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct Ab {
            a: u32,
            b: &'static str,
        }
        #[derive(Serialize)]
        struct Ba {
            b: &'static str,
            a: u32,
        }
        assert_eq!(
            canonical_hash(&Ab { a: 1, b: "x" }).unwrap(),
            canonical_hash(&Ba { b: "x", a: 1 }).unwrap()
        );
    }

    #[test]
    fn test_length_prefix_prevents_concatenation_collisions() {
        assert_ne!(
            canonical_hash(&["ab", "c"]).unwrap(),
            canonical_hash(&["a", "bc"]).unwrap()
        );
    }

    #[test]
    fn test_short_hash() {
        let hash = hash_bytes(b"hello");
        assert_eq!(hash.as_str().len(), 64);
        assert_eq!(hash.short().len(), 8);
        assert!(hash.as_str().starts_with(hash.short()));
    }

    proptest! {
        #[test]
        fn prop_insertion_order_is_irrelevant(entries in prop::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..16)) {
            let forward: HashMap<String, i64> = entries.iter().cloned().collect();
            let mut reversed = HashMap::new();
            for (k, v) in entries.iter().rev() {
                reversed.entry(k.clone()).or_insert(*v);
            }
            // both maps must agree on the surviving value for each key
            let forward: BTreeMap<_, _> = forward.into_iter().filter(|(k, v)| reversed.get(k) == Some(v)).collect();
            let reversed: HashMap<_, _> = reversed.into_iter().filter(|(k, _)| forward.contains_key(k)).collect();
            prop_assert_eq!(canonical_hash(&forward).unwrap(), canonical_hash(&reversed).unwrap());
        }
    }
}
