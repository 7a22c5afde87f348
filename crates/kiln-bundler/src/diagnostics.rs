//! Structured build diagnostics.
//!
//! Resolution and transform failures do not stop a build on the first
//! occurrence. They are recorded here and surfaced together when the build
//! finishes, so one pass shows every broken import.

use serde::{Deserialize, Serialize};

use crate::context::Stage;

/// Category of a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    UnresolvedEntry,
    UnresolvedImport,
    Load,
    Parse,
    Transform,
    Plugin,
    DependencyFailed,
    Other(String),
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::UnresolvedEntry => write!(f, "UnresolvedEntry"),
            DiagnosticKind::UnresolvedImport => write!(f, "UnresolvedImport"),
            DiagnosticKind::Load => write!(f, "Load"),
            DiagnosticKind::Parse => write!(f, "ParseError"),
            DiagnosticKind::Transform => write!(f, "Transform"),
            DiagnosticKind::Plugin => write!(f, "Plugin"),
            DiagnosticKind::DependencyFailed => write!(f, "DependencyFailed"),
            DiagnosticKind::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A problem found while building, tagged with the stage that found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Root-relative path of the module the problem is about.
    pub path: Option<String>,
    /// Root-relative path of the importing module.
    pub importer: Option<String>,
    pub specifier: Option<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            path: None,
            importer: None,
            specifier: None,
            help: None,
        }
    }

    /// An import that resolved to nothing.
    pub fn unresolved_import(importer: impl Into<String>, specifier: impl Into<String>) -> Self {
        let importer = importer.into();
        let specifier = specifier.into();
        Self {
            message: format!("cannot resolve '{specifier}' from {importer}"),
            path: Some(importer.clone()),
            importer: Some(importer),
            specifier: Some(specifier),
            help: Some(
                "Check the path and extension. Bare package imports are not bundled.".to_string(),
            ),
            ..Self::new(Stage::Graph, DiagnosticKind::UnresolvedImport, "")
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.kind, self.message)?;
        if let (Some(path), None) = (&self.path, &self.importer) {
            write!(f, " ({path})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_import_carries_context() {
        let diag = Diagnostic::unresolved_import("src/main.ts", "./missing");
        assert_eq!(diag.stage, Stage::Graph);
        assert_eq!(diag.kind, DiagnosticKind::UnresolvedImport);
        assert_eq!(diag.importer.as_deref(), Some("src/main.ts"));
        assert_eq!(diag.specifier.as_deref(), Some("./missing"));
        assert!(diag.to_string().contains("cannot resolve './missing'"));
    }

    #[test]
    fn display_includes_path() {
        let diag = Diagnostic::new(Stage::Execute, DiagnosticKind::Transform, "boom")
            .with_path("src/a.ts");
        assert_eq!(diag.to_string(), "[execute] Transform: boom (src/a.ts)");
    }
}
