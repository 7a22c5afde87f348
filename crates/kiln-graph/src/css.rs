//! Stylesheet emission order.
//!
//! CSS is never evaluated here. The resolver only decides the order in which
//! stylesheet edges are concatenated so that the cascade in the output
//! matches the cascade the author declared.

use crate::edge::GraphEdge;

/// Canonical layer order used when a project declares none.
pub const DEFAULT_LAYERS: &[&str] = &["base", "components", "utilities"];

#[derive(Debug, Clone)]
pub struct CssPrecedenceResolver {
    layers: Vec<String>,
}

impl Default for CssPrecedenceResolver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CssPrecedenceResolver {
    /// Project-declared layers replace the canonical order entirely.
    pub fn new(declared_layers: Option<Vec<String>>) -> Self {
        let layers = match declared_layers {
            Some(layers) if !layers.is_empty() => layers,
            _ => DEFAULT_LAYERS.iter().map(|l| l.to_string()).collect(),
        };
        Self { layers }
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Rank of a layer; later ranks win the cascade.
    ///
    /// Layers nobody declared sort after every declared layer and unlayered
    /// styles sort last, mirroring how browsers treat them.
    pub fn layer_rank(&self, layer: Option<&str>) -> usize {
        match layer {
            Some(name) => self
                .layers
                .iter()
                .position(|l| l == name)
                .unwrap_or(self.layers.len()),
            None => self.layers.len() + 1,
        }
    }

    /// Order stylesheet edges by (layer, specificity, source order).
    ///
    /// Non-stylesheet edges are dropped. Edges without precedence metadata
    /// are treated as unlayered and keep their input position.
    pub fn order(&self, edges: &[GraphEdge]) -> Vec<GraphEdge> {
        let mut keyed: Vec<((usize, u32, u32, usize), &GraphEdge)> = edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.kind.is_css())
            .map(|(index, edge)| {
                let key = match edge.precedence() {
                    Some(p) => (
                        self.layer_rank(p.layer.as_deref()),
                        p.specificity,
                        p.source_order,
                        index,
                    ),
                    None => (self.layer_rank(None), 0, index as u32, index),
                };
                (key, edge)
            })
            .collect();

        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, edge)| edge.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{EdgeKind, EdgeMetadata, Precedence};
    use crate::module_id::ModuleId;
    use crate::module::ModuleKind;

    fn edge(name: &str, layer: Option<&str>, specificity: u32, order: u32) -> GraphEdge {
        GraphEdge {
            from: ModuleId::new(ModuleKind::Css, "main.css"),
            to: ModuleId::new(ModuleKind::Css, name),
            kind: EdgeKind::CssLayer,
            specifier: name.to_string(),
            metadata: Some(EdgeMetadata {
                precedence: Precedence {
                    layer: layer.map(str::to_string),
                    specificity,
                    source_order: order,
                },
            }),
        }
    }

    fn names(edges: &[GraphEdge]) -> Vec<&str> {
        edges.iter().map(|e| e.specifier.as_str()).collect()
    }

    #[test]
    fn test_default_layer_order() {
        let resolver = CssPrecedenceResolver::default();
        let ordered = resolver.order(&[
            edge("utilities.css", Some("utilities"), 0, 0),
            edge("plain.css", None, 0, 1),
            edge("base.css", Some("base"), 0, 2),
            edge("components.css", Some("components"), 0, 3),
        ]);
        assert_eq!(
            names(&ordered),
            ["base.css", "components.css", "utilities.css", "plain.css"]
        );
    }

    #[test]
    fn test_declared_layers_override_default() {
        let resolver =
            CssPrecedenceResolver::new(Some(vec!["utilities".into(), "base".into()]));
        let ordered = resolver.order(&[
            edge("base.css", Some("base"), 0, 0),
            edge("utilities.css", Some("utilities"), 0, 1),
        ]);
        assert_eq!(names(&ordered), ["utilities.css", "base.css"]);
    }

    #[test]
    fn test_specificity_then_source_order() {
        let resolver = CssPrecedenceResolver::default();
        let ordered = resolver.order(&[
            edge("b.css", Some("base"), 1, 0),
            edge("a2.css", Some("base"), 0, 2),
            edge("a1.css", Some("base"), 0, 1),
        ]);
        assert_eq!(names(&ordered), ["a1.css", "a2.css", "b.css"]);
    }

    #[test]
    fn test_non_css_edges_ignored() {
        let resolver = CssPrecedenceResolver::default();
        let mut js = edge("x.js", None, 0, 0);
        js.kind = EdgeKind::StaticImport;
        assert!(resolver.order(&[js]).is_empty());
    }
}
