//! Path normalization shared by module identity and every hash.
//!
//! All paths that reach the graph are normalized to an absolute,
//! `/`-separated form with a lower-case drive letter. Anything that feeds a
//! hash uses the root-relative form so two checkouts of the same project in
//! different directories produce the same identities.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

/// Prefix used by modules that have no file on disk.
pub const VIRTUAL_PREFIX: &str = "virtual:";

/// Returns true for `virtual:` module ids.
pub fn is_virtual(path: &str) -> bool {
    path.starts_with(VIRTUAL_PREFIX)
}

/// Normalize a path to its absolute, `/`-separated, cleaned form.
///
/// Relative paths are resolved against the process working directory. Use
/// [`normalize_path_from`] to resolve against a project root instead.
pub fn normalize_path(path: impl AsRef<Path>) -> String {
    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    normalize_path_from(&base, path)
}

/// Normalize `path`, resolving relative inputs against `base`.
///
/// `virtual:` ids are returned unchanged.
pub fn normalize_path_from(base: impl AsRef<Path>, path: impl AsRef<Path>) -> String {
    let raw = to_slashes(path.as_ref());
    if is_virtual(&raw) {
        return raw;
    }

    let joined = if is_absolute_str(&raw) {
        raw
    } else {
        let base = to_slashes(base.as_ref());
        format!("{}/{}", base.trim_end_matches('/'), raw)
    };

    clean(&lower_drive_letter(&joined))
}

/// Express a normalized path relative to a normalized root.
///
/// The result never starts with `/`; paths outside the root get `../`
/// segments and the root itself maps to `.`.
pub fn relative_to_root(root: &str, path: &str) -> String {
    if is_virtual(path) {
        return path.to_string();
    }

    let root_parts: Vec<&str> = split(root);
    let path_parts: Vec<&str> = split(path);

    let common = root_parts
        .iter()
        .zip(path_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..root_parts.len() {
        parts.push("..");
    }
    parts.extend_from_slice(&path_parts[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Parent directory of a normalized path.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) if path[..idx].ends_with(':') => &path[..=idx],
        Some(idx) => &path[..idx],
        None => path,
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn to_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_absolute_str(path: &str) -> bool {
    path.starts_with('/') || has_drive_letter(path)
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn lower_drive_letter(path: &str) -> String {
    if has_drive_letter(path) {
        let mut out = path[..1].to_ascii_lowercase();
        out.push_str(&path[1..]);
        out
    } else {
        path.to_string()
    }
}

fn clean(path: &str) -> String {
    let cleaned = to_slashes(&PathBuf::from(path).clean());
    if cleaned.len() == 2 && has_drive_letter(&cleaned) {
        // `c:` alone is drive-relative; keep the root separator
        return format!("{cleaned}/");
    }
    if cleaned.len() > 1 {
        cleaned.trim_end_matches('/').to_string()
    } else {
        cleaned
    }
}
