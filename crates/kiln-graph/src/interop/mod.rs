//! Module interop analysis.
//!
//! Computes the export shape of a module and the dependency edges it
//! declares. The export shape is what the HMR engine compares to decide
//! whether a change can be applied in place.

mod accept;
mod css_modules;
mod exports;
mod scanner;

use std::collections::BTreeSet;

use oxc_span::SourceType;
use serde::{Deserialize, Serialize};

use crate::hash::{CanonicalHasher, ContentHash};
use crate::module::ModuleKind;

pub use accept::is_self_accepting;
pub use css_modules::{css_module_classes, scan_css_imports};
pub use scanner::scan_dependencies;

/// Errors produced while analyzing module source.
#[derive(Debug, thiserror::Error)]
pub enum InteropError {
    /// The module does not parse.
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// The module content is not valid UTF-8.
    #[error("{path} is not valid UTF-8")]
    Encoding { path: String },
}

/// Public export surface of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMap {
    pub named: BTreeSet<String>,
    pub has_default: bool,
    /// The surface cannot be known statically (`export *`, CommonJS).
    pub is_dynamic: bool,
    /// Some export is a `let`/`var` binding whose value may change.
    pub live_bindings: bool,
}

impl ExportMap {
    /// Hash of the observable shape.
    ///
    /// Live bindings do not change what importers can name, so they stay out
    /// of the hash.
    pub fn shape_hash(&self) -> ContentHash {
        let mut hasher = CanonicalHasher::new();
        hasher.update_u64(self.named.len() as u64);
        for name in &self.named {
            hasher.update_str(name);
        }
        hasher.update_bool(self.has_default);
        hasher.update_bool(self.is_dynamic);
        hasher.finish()
    }
}

/// Compute the export shape of a module.
pub fn analyze_exports(source: &str, path: &str, kind: ModuleKind) -> Result<ExportMap, InteropError> {
    match kind {
        ModuleKind::Css => Ok(ExportMap::default()),
        ModuleKind::CssModule => Ok(ExportMap {
            named: css_module_classes(source).into_iter().collect(),
            has_default: true,
            ..ExportMap::default()
        }),
        // assets default-export their URL
        ModuleKind::StyleAsset => Ok(ExportMap {
            has_default: true,
            ..ExportMap::default()
        }),
        ModuleKind::File | ModuleKind::Virtual | ModuleKind::CssInJs => {
            exports::extract_exports(source, path)
        }
    }
}

pub(crate) fn source_type_for(path: &str) -> SourceType {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    SourceType::from_path(file_name).unwrap_or_else(|_| SourceType::mjs())
}
