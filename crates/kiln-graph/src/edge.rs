use serde::{Deserialize, Serialize};

use crate::module_id::ModuleId;

/// How one module refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    StaticImport,
    DynamicImport,
    CssImport,
    CssLayer,
}

impl EdgeKind {
    pub fn is_css(&self) -> bool {
        matches!(self, EdgeKind::CssImport | EdgeKind::CssLayer)
    }

    /// Edges that pull their target into the importer's chunk.
    pub fn is_eager(&self) -> bool {
        !matches!(self, EdgeKind::DynamicImport)
    }
}

/// Cascade position of a stylesheet edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Precedence {
    pub layer: Option<String>,
    pub specificity: u32,
    pub source_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeMetadata {
    pub precedence: Precedence,
}

/// A resolved dependency from one module to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: ModuleId,
    pub to: ModuleId,
    pub kind: EdgeKind,
    pub specifier: String,
    pub metadata: Option<EdgeMetadata>,
}

impl GraphEdge {
    pub fn precedence(&self) -> Option<&Precedence> {
        self.metadata.as_ref().map(|m| &m.precedence)
    }
}

/// An edge as discovered in source, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeSpec {
    pub specifier: String,
    pub kind: EdgeKind,
    pub precedence: Option<Precedence>,
}

impl EdgeSpec {
    pub fn new(specifier: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            precedence: None,
        }
    }

    pub fn static_import(specifier: impl Into<String>) -> Self {
        Self::new(specifier, EdgeKind::StaticImport)
    }

    pub fn dynamic_import(specifier: impl Into<String>) -> Self {
        Self::new(specifier, EdgeKind::DynamicImport)
    }

    pub fn css_import(specifier: impl Into<String>, source_order: u32) -> Self {
        Self {
            precedence: Some(Precedence {
                source_order,
                ..Precedence::default()
            }),
            ..Self::new(specifier, EdgeKind::CssImport)
        }
    }

    pub fn css_layer(
        specifier: impl Into<String>,
        layer: Option<String>,
        source_order: u32,
    ) -> Self {
        Self {
            precedence: Some(Precedence {
                layer,
                specificity: 0,
                source_order,
            }),
            ..Self::new(specifier, EdgeKind::CssLayer)
        }
    }

    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = Some(precedence);
        self
    }
}
