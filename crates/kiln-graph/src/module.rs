use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edge::GraphEdge;
use crate::module_id::ModuleId;
use crate::path::is_virtual;

/// What a module is, as far as planning and HMR care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// JavaScript or TypeScript source on disk.
    File,
    /// Source that only exists in memory (`virtual:*`).
    Virtual,
    /// Binary asset referenced from styles or scripts (images, fonts).
    StyleAsset,
    /// Plain stylesheet.
    Css,
    /// Stylesheet whose class names are exported (`*.module.css`).
    CssModule,
    /// Script that produces styles at build time (`*.css.ts`).
    CssInJs,
}

const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp", "woff", "woff2", "ttf",
    "otf", "eot", "mp4", "webm", "mp3", "wav",
];

impl ModuleKind {
    /// Infer the kind from a normalized path or virtual id.
    pub fn from_path(path: &str) -> Self {
        if is_virtual(path) {
            return ModuleKind::Virtual;
        }

        let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
        if file_name.ends_with(".module.css") {
            return ModuleKind::CssModule;
        }
        if file_name.ends_with(".css") {
            return ModuleKind::Css;
        }
        for suffix in [".css.ts", ".css.js", ".styles.ts", ".styles.js"] {
            if file_name.ends_with(suffix) {
                return ModuleKind::CssInJs;
            }
        }

        match file_name.rsplit_once('.') {
            Some((_, ext)) if ASSET_EXTENSIONS.contains(&ext) => ModuleKind::StyleAsset,
            _ => ModuleKind::File,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::File => "file",
            ModuleKind::Virtual => "virtual",
            ModuleKind::StyleAsset => "style-asset",
            ModuleKind::Css => "css",
            ModuleKind::CssModule => "css-module",
            ModuleKind::CssInJs => "css-in-js",
        }
    }

    /// Stylesheets are hot-swapped without touching module state.
    pub fn is_stylesheet(&self) -> bool {
        matches!(self, ModuleKind::Css | ModuleKind::CssModule)
    }

    /// Kinds whose content is executable script.
    pub fn is_script(&self) -> bool {
        matches!(self, ModuleKind::File | ModuleKind::Virtual | ModuleKind::CssInJs)
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module in the dependency graph.
///
/// Nodes are owned by the graph and handed out as `Arc` snapshots; only graph
/// construction replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: ModuleId,
    /// Absolute normalized path or virtual id.
    pub path: String,
    /// Path relative to the project root; the only form that feeds hashes.
    pub relative_path: String,
    pub kind: ModuleKind,
    /// Outgoing edges in source order.
    pub edges: Vec<GraphEdge>,
    /// Import specifier to resolved target.
    pub specifier_map: BTreeMap<String, ModuleId>,
    pub is_entry: bool,
}

impl GraphNode {
    /// Distinct targets in first-seen order.
    pub fn targets(&self) -> Vec<ModuleId> {
        let mut seen = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !seen.contains(&edge.to) {
                seen.push(edge.to.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(ModuleKind::from_path("/p/a.module.css"), ModuleKind::CssModule);
        assert_eq!(ModuleKind::from_path("/p/a.css"), ModuleKind::Css);
        assert_eq!(ModuleKind::from_path("/p/theme.css.ts"), ModuleKind::CssInJs);
        assert_eq!(ModuleKind::from_path("/p/logo.SVG"), ModuleKind::StyleAsset);
        assert_eq!(ModuleKind::from_path("virtual:env"), ModuleKind::Virtual);
        assert_eq!(ModuleKind::from_path("/p/main.tsx"), ModuleKind::File);
    }

    #[test]
    fn test_stylesheet_classification() {
        assert!(ModuleKind::Css.is_stylesheet());
        assert!(ModuleKind::CssModule.is_stylesheet());
        assert!(!ModuleKind::CssInJs.is_stylesheet());
        assert!(ModuleKind::CssInJs.is_script());
    }
}
