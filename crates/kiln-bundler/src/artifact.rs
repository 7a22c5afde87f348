//! Build outputs.

use std::sync::Arc;

use kiln_graph::{ContentHash, ModuleId, hash_bytes};
use serde::{Deserialize, Serialize};

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// Concatenated script of one chunk.
    Chunk,
    /// Ordered stylesheet content of one chunk.
    Stylesheet,
    /// Binary asset copied from the source tree.
    Asset,
}

impl ArtifactType {
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ArtifactType::Chunk => Some("js"),
            ArtifactType::Stylesheet => Some("css"),
            ArtifactType::Asset => None,
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactType::Chunk => "chunk",
            ArtifactType::Stylesheet => "stylesheet",
            ArtifactType::Asset => "asset",
        };
        f.write_str(name)
    }
}

/// An immutable output file.
///
/// `id` is the content hash of `source`; two builds that produce the same
/// bytes produce the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub id: ContentHash,
    pub artifact_type: ArtifactType,
    pub file_name: String,
    /// File names of artifacts this one loads first.
    pub dependencies: Vec<String>,
    pub source: Arc<[u8]>,
    /// Modules whose code went into the artifact, in emission order.
    pub modules: Vec<ModuleId>,
    /// Plan chunk the artifact was produced for.
    pub chunk: Option<String>,
}

impl BuildArtifact {
    /// Hash `source` and derive `<stem>-<hash8>.<ext>`.
    pub fn new(
        artifact_type: ArtifactType,
        stem: &str,
        extension: &str,
        source: Vec<u8>,
    ) -> Self {
        let id = hash_bytes(&source);
        let file_name = if extension.is_empty() {
            format!("{stem}-{}", id.short())
        } else {
            format!("{stem}-{}.{extension}", id.short())
        };
        Self {
            id,
            artifact_type,
            file_name,
            dependencies: Vec::new(),
            source: Arc::from(source),
            modules: Vec::new(),
            chunk: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_modules(mut self, modules: Vec<ModuleId>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_chunk(mut self, chunk: impl Into<String>) -> Self {
        self.chunk = Some(chunk.into());
        self
    }

    pub fn source_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.source).ok()
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_short_hash() {
        let artifact = BuildArtifact::new(ArtifactType::Chunk, "main", "js", b"let a;".to_vec());
        assert_eq!(artifact.file_name, format!("main-{}.js", &artifact.id.as_str()[..8]));
        assert_eq!(artifact.source_text(), Some("let a;"));
    }

    #[test]
    fn equal_bytes_equal_ids() {
        let a = BuildArtifact::new(ArtifactType::Asset, "logo", "png", vec![1, 2, 3]);
        let b = BuildArtifact::new(ArtifactType::Asset, "logo", "png", vec![1, 2, 3]);
        assert_eq!(a.id, b.id);
        assert_eq!(a.file_name, b.file_name);
    }
}
