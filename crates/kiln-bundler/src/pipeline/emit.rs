//! Writing artifacts and the manifest.
//!
//! Every file name is validated against the output directory before anything
//! is written. Files go to temporary names first and are renamed into place
//! once all writes succeeded; on failure the temporary files are removed.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_graph::{ContentHash, ModuleId};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactType, BuildArtifact};
use crate::fingerprint::BuildFingerprint;
use crate::{BuildError, Result};

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One artifact as recorded in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file_name: String,
    pub hash: ContentHash,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub modules: Vec<ModuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Sorted by file name.
    pub artifacts: Vec<ManifestEntry>,
    pub fingerprint: BuildFingerprint,
}

impl Manifest {
    pub fn new(artifacts: &[BuildArtifact], fingerprint: &BuildFingerprint) -> Self {
        let mut entries: Vec<ManifestEntry> = artifacts
            .iter()
            .map(|artifact| ManifestEntry {
                file_name: artifact.file_name.clone(),
                hash: artifact.id.clone(),
                artifact_type: artifact.artifact_type,
                dependencies: artifact.dependencies.clone(),
                modules: artifact.modules.clone(),
                chunk: artifact.chunk.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self {
            artifacts: entries,
            fingerprint: fingerprint.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::WriteFailure(format!("Failed to serialize manifest: {e}")))
    }

    pub fn from_json(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| BuildError::InvalidConfig(format!("Invalid manifest: {e}")))
    }

    /// Rebuild artifacts from their recorded metadata and bytes.
    ///
    /// Returns `None` when a file is missing or its bytes no longer match the
    /// recorded hash.
    pub fn restore<'a>(
        &self,
        mut bytes_of: impl FnMut(&str) -> Option<&'a [u8]>,
    ) -> Option<Vec<BuildArtifact>> {
        self.artifacts
            .iter()
            .map(|entry| {
                let bytes = bytes_of(&entry.file_name)?;
                let (stem, extension) = split_file_name(&entry.file_name, &entry.hash);
                let artifact = BuildArtifact::new(entry.artifact_type, stem, extension, bytes.to_vec())
                    .with_dependencies(entry.dependencies.clone())
                    .with_modules(entry.modules.clone());
                let artifact = match &entry.chunk {
                    Some(chunk) => artifact.with_chunk(chunk),
                    None => artifact,
                };
                (artifact.id == entry.hash && artifact.file_name == entry.file_name)
                    .then_some(artifact)
            })
            .collect()
    }
}

/// `(stem, extension)` of `<stem>-<hash8>[.<ext>]`.
fn split_file_name<'a>(file_name: &'a str, hash: &ContentHash) -> (&'a str, &'a str) {
    let marker = format!("-{}", hash.short());
    match file_name.rfind(&marker) {
        Some(pos) => {
            let rest = &file_name[pos + marker.len()..];
            (&file_name[..pos], rest.strip_prefix('.').unwrap_or(rest))
        }
        None => (file_name, ""),
    }
}

/// Write artifacts and `manifest.json` to `out_dir`.
///
/// # Errors
///
/// - `InvalidOutputPath` if a file name escapes the output directory
/// - `WriteFailure` if any I/O operation fails
pub fn emit(
    out_dir: &Path,
    artifacts: &[BuildArtifact],
    fingerprint: &BuildFingerprint,
) -> Result<Manifest> {
    let dir = validate_and_normalize_dir(out_dir)?;

    fs::create_dir_all(&dir).map_err(|e| {
        BuildError::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let manifest = Manifest::new(artifacts, fingerprint);
    let manifest_json = manifest.to_json()?;

    let mut operations: Vec<(PathBuf, &[u8])> = Vec::with_capacity(artifacts.len() + 1);
    for artifact in artifacts {
        let target_path = validate_output_path(&dir, &artifact.file_name)?;
        operations.push((target_path, &artifact.source[..]));
    }
    operations.push((validate_output_path(&dir, MANIFEST_FILE)?, manifest_json.as_bytes()));

    write_files_atomic(&operations)?;
    tracing::info!(
        out_dir = %dir.display(),
        files = artifacts.len(),
        "artifacts emitted"
    );
    Ok(manifest)
}

fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    Ok(std::env::current_dir()
        .map_err(|e| BuildError::InvalidOutputPath(format!("Failed to get current directory: {e}")))?
        .join(&cleaned)
        .clean())
}

/// Validates an output path to prevent directory traversal.
///
/// Absolute names and names that leave `base_dir` after cleaning are
/// rejected.
fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() || filename.contains('\0') {
        return Err(BuildError::InvalidOutputPath(format!(
            "invalid file name {filename:?}"
        )));
    }

    let filename_path = Path::new(filename);
    if filename_path.is_absolute() {
        return Err(BuildError::InvalidOutputPath(format!(
            "Path '{filename}' is absolute"
        )));
    }

    let full_path = base_dir.join(filename_path.clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(BuildError::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

/// Writes files through temporary names, removing them if anything fails.
fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(operations.len());

    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                BuildError::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = temp_path_for(target_path);
        fs::write(&temp_path, content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            BuildError::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;
        temp_files.push((temp_path, target_path.clone()));
    }

    for (temp_path, target_path) in &temp_files {
        fs::rename(temp_path, target_path).map_err(|e| {
            cleanup_temp_files(&temp_files);
            BuildError::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp_path.display(),
                target_path.display(),
                e
            ))
        })?;
    }

    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Best-effort cleanup; we're already in an error state.
fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp_path, _) in temp_files {
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(temp_path) {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = %e,
                    "failed to clean up temporary file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ENGINE_VERSION;
    use kiln_config::Target;
    use kiln_graph::hash_bytes;

    fn fingerprint() -> BuildFingerprint {
        BuildFingerprint {
            engine_version: ENGINE_VERSION.into(),
            graph_hash: hash_bytes(b"g"),
            plan_hash: hash_bytes(b"p"),
            input_hash: hash_bytes(b"i"),
            output_hash: hash_bytes(b"o"),
            target: Target::Browser,
            build_time: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_validate_output_path_normal() {
        let base = Path::new("/tmp/output");
        assert_eq!(
            validate_output_path(base, "index.js").unwrap(),
            Path::new("/tmp/output/index.js")
        );
        assert_eq!(
            validate_output_path(base, "./nested/index.js").unwrap(),
            Path::new("/tmp/output/nested/index.js")
        );
    }

    #[test]
    fn test_validate_output_path_traversal() {
        let base = Path::new("/tmp/output");
        for name in ["../etc/passwd", "safe/../../../etc/passwd", "/etc/passwd", "a\0b", ""] {
            let err = validate_output_path(base, name).unwrap_err();
            assert!(matches!(err, BuildError::InvalidOutputPath(_)), "{name:?}");
        }
    }

    #[test]
    fn emit_writes_files_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        let artifacts = vec![
            BuildArtifact::new(ArtifactType::Chunk, "main", "js", b"console.log(1);\n".to_vec())
                .with_chunk("main"),
            BuildArtifact::new(ArtifactType::Stylesheet, "main", "css", b"a{}".to_vec()),
        ];

        let manifest = emit(&out, &artifacts, &fingerprint()).unwrap();
        for artifact in &artifacts {
            let written = fs::read(out.join(&artifact.file_name)).unwrap();
            assert_eq!(written, artifact.source.to_vec());
        }

        let raw = fs::read(out.join(MANIFEST_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(json["artifacts"][0]["fileName"].is_string());
        assert!(json["artifacts"][0]["type"].is_string());
        assert_eq!(json["fingerprint"]["target"], "browser");
        assert_eq!(Manifest::from_json(&raw).unwrap(), manifest);

        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn restore_round_trips_metadata() {
        let artifact = BuildArtifact::new(ArtifactType::Asset, "logo", "png", vec![1, 2, 3])
            .with_dependencies(vec!["x.js".into()]);
        let manifest = Manifest::new(std::slice::from_ref(&artifact), &fingerprint());
        let restored = manifest
            .restore(|name| (name == artifact.file_name).then_some(&artifact.source[..]))
            .unwrap();
        assert_eq!(restored, vec![artifact.clone()]);

        let tampered = manifest.restore(|_| Some(&b"other"[..]));
        assert!(tampered.is_none());
    }
}
