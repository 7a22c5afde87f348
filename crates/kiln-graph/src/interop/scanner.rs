//! Dependency edge discovery.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ImportExpression, ModuleDeclaration};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::GetSpan;

use super::css_modules::scan_css_imports;
use super::{InteropError, source_type_for};
use crate::edge::EdgeSpec;
use crate::module::ModuleKind;

/// Edges a module declares, in source order, without duplicates.
///
/// Scripts yield static imports and re-exports (type-only ones skipped) and
/// `import("literal")` calls. Stylesheets yield their `@import` rules. Assets
/// have no dependencies.
pub fn scan_dependencies(
    source: &str,
    path: &str,
    kind: ModuleKind,
) -> Result<Vec<EdgeSpec>, InteropError> {
    match kind {
        ModuleKind::Css | ModuleKind::CssModule => Ok(scan_css_imports(source)),
        ModuleKind::StyleAsset => Ok(Vec::new()),
        ModuleKind::File | ModuleKind::Virtual | ModuleKind::CssInJs => {
            scan_script_imports(source, path)
        }
    }
}

fn scan_script_imports(source: &str, path: &str) -> Result<Vec<EdgeSpec>, InteropError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();

    if let Some(error) = ret.errors.first() {
        return Err(InteropError::Parse {
            path: path.to_string(),
            message: error.to_string(),
        });
    }

    let mut found: Vec<(u32, EdgeSpec)> = Vec::new();

    for stmt in ret.program.body.iter() {
        let Some(module_decl) = stmt.as_module_declaration() else {
            continue;
        };
        let source = match module_decl {
            ModuleDeclaration::ImportDeclaration(import) if !import.import_kind.is_type() => {
                Some(&import.source)
            }
            ModuleDeclaration::ExportNamedDeclaration(named) if !named.export_kind.is_type() => {
                named.source.as_ref()
            }
            ModuleDeclaration::ExportAllDeclaration(all) if !all.export_kind.is_type() => {
                Some(&all.source)
            }
            _ => None,
        };
        if let Some(lit) = source {
            found.push((lit.span.start, EdgeSpec::static_import(lit.value.as_str())));
        }
    }

    let mut visitor = DynamicImportVisitor::default();
    visitor.visit_program(&ret.program);
    found.extend(visitor.found);

    found.sort_by_key(|(start, _)| *start);

    let mut edges: Vec<EdgeSpec> = Vec::with_capacity(found.len());
    for (_, edge) in found {
        if !edges
            .iter()
            .any(|e| e.specifier == edge.specifier && e.kind == edge.kind)
        {
            edges.push(edge);
        }
    }
    Ok(edges)
}

#[derive(Default)]
struct DynamicImportVisitor {
    found: Vec<(u32, EdgeSpec)>,
}

impl<'a> Visit<'a> for DynamicImportVisitor {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.found
                .push((expr.span().start, EdgeSpec::dynamic_import(lit.value.as_str())));
        }
        walk::walk_import_expression(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeKind;

    fn scan(source: &str) -> Vec<(String, EdgeKind)> {
        scan_dependencies(source, "/p/main.ts", ModuleKind::File)
            .unwrap()
            .into_iter()
            .map(|e| (e.specifier, e.kind))
            .collect()
    }

    #[test]
    fn test_static_and_dynamic_in_source_order() {
        let edges = scan(
            r#"
            import a from './a';
            const lazy = () => import('./lazy');
            export { b } from './b';
            export * from './c';
            import './a';
            "#,
        );
        assert_eq!(
            edges,
            vec![
                ("./a".to_string(), EdgeKind::StaticImport),
                ("./lazy".to_string(), EdgeKind::DynamicImport),
                ("./b".to_string(), EdgeKind::StaticImport),
                ("./c".to_string(), EdgeKind::StaticImport),
            ]
        );
    }

    #[test]
    fn test_type_only_imports_skipped() {
        let edges = scan("import type { T } from './types'; export type { U } from './u';");
        assert!(edges.is_empty());
    }

    #[test]
    fn test_computed_dynamic_import_ignored() {
        let edges = scan("const name = 'x'; import(`./pages/${name}`);");
        assert!(edges.is_empty());
    }

    #[test]
    fn test_stylesheet_dispatch() {
        let edges =
            scan_dependencies("@import './base.css';", "/p/a.css", ModuleKind::Css).unwrap();
        assert_eq!(edges[0].kind, EdgeKind::CssImport);
    }
}
