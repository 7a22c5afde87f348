//! Export shape extraction for script modules.

use memchr::memmem;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, Declaration, ExportDefaultDeclarationKind,
    ModuleDeclaration, ModuleExportName, Statement, VariableDeclarationKind,
};
use oxc_parser::Parser;
use rustc_hash::FxHashSet;

use super::{ExportMap, InteropError, source_type_for};

pub(super) fn extract_exports(source: &str, path: &str) -> Result<ExportMap, InteropError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();

    if let Some(error) = ret.errors.first() {
        return Err(InteropError::Parse {
            path: path.to_string(),
            message: error.to_string(),
        });
    }

    let program = &ret.program;
    let mutable_bindings = top_level_mutable_bindings(&program.body);

    let mut map = ExportMap::default();
    let mut has_module_syntax = false;

    for stmt in program.body.iter() {
        let Some(module_decl) = stmt.as_module_declaration() else {
            continue;
        };
        has_module_syntax = true;

        match module_decl {
            ModuleDeclaration::ImportDeclaration(_) => {}
            ModuleDeclaration::ExportDefaultDeclaration(default) => {
                if !matches!(
                    default.declaration,
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(_)
                ) {
                    map.has_default = true;
                }
            }
            ModuleDeclaration::ExportNamedDeclaration(named) => {
                if named.export_kind.is_type() {
                    continue;
                }

                if let Some(decl) = &named.declaration {
                    collect_declaration(decl, &mut map);
                }

                for spec in named.specifiers.iter() {
                    if spec.export_kind.is_type() {
                        continue;
                    }
                    let exported = export_name(&spec.exported);
                    if named.source.is_none()
                        && mutable_bindings.contains(export_name(&spec.local).as_str())
                    {
                        map.live_bindings = true;
                    }
                    if exported == "default" {
                        map.has_default = true;
                    } else {
                        map.named.insert(exported);
                    }
                }
            }
            ModuleDeclaration::ExportAllDeclaration(all) => {
                if all.export_kind.is_type() {
                    continue;
                }
                match &all.exported {
                    Some(name) => {
                        map.named.insert(export_name(name));
                    }
                    None => map.is_dynamic = true,
                }
            }
            ModuleDeclaration::TSExportAssignment(_) => map.is_dynamic = true,
            _ => {}
        }
    }

    if !has_module_syntax && looks_like_commonjs(source) {
        map.is_dynamic = true;
    }

    Ok(map)
}

fn collect_declaration(decl: &Declaration<'_>, map: &mut ExportMap) {
    match decl {
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                map.named.insert(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                map.named.insert(id.name.to_string());
            }
        }
        Declaration::VariableDeclaration(var) => {
            if matches!(var.kind, VariableDeclarationKind::Let | VariableDeclarationKind::Var) {
                map.live_bindings = true;
            }
            for declarator in var.declarations.iter() {
                let mut names = Vec::new();
                binding_names(&declarator.id, &mut names);
                map.named.extend(names);
            }
        }
        Declaration::TSEnumDeclaration(decl) => {
            map.named.insert(decl.id.name.to_string());
        }
        // interfaces, type aliases and ambient namespaces have no runtime value
        _ => {}
    }
}

fn binding_names(pattern: &BindingPattern<'_>, out: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => out.push(ident.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in object.properties.iter() {
                binding_names(&property.value, out);
            }
            if let Some(rest) = &object.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                binding_names(element, out);
            }
            if let Some(rest) = &array.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => binding_names(&assign.left, out),
    }
}

/// Top-level `let`/`var` names, including ones exported later via `export { x }`.
fn top_level_mutable_bindings(body: &[Statement<'_>]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for stmt in body {
        let var = match stmt {
            Statement::VariableDeclaration(var) => var,
            _ => continue,
        };
        if !matches!(var.kind, VariableDeclarationKind::Let | VariableDeclarationKind::Var) {
            continue;
        }
        for declarator in var.declarations.iter() {
            let mut out = Vec::new();
            binding_names(&declarator.id, &mut out);
            names.extend(out);
        }
    }
    names
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

fn looks_like_commonjs(source: &str) -> bool {
    let bytes = source.as_bytes();
    memmem::find(bytes, b"module.exports").is_some() || memmem::find(bytes, b"exports.").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(source: &str) -> ExportMap {
        extract_exports(source, "/p/mod.ts").expect("parse")
    }

    fn named(map: &ExportMap) -> Vec<&str> {
        map.named.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_named_declarations() {
        let map = shape(
            "export const a = 1; export function b() {} export class C {} export const { d, e: [f] } = obj;",
        );
        assert_eq!(named(&map), ["C", "a", "b", "d", "f"]);
        assert!(!map.has_default);
        assert!(!map.is_dynamic);
        assert!(!map.live_bindings);
    }

    #[test]
    fn test_default_export() {
        assert!(shape("export default function () {}").has_default);
        assert!(shape("const x = 1; export { x as default }").has_default);
    }

    #[test]
    fn test_star_reexport_is_dynamic() {
        let map = shape("export * from './other'");
        assert!(map.is_dynamic);
        assert!(map.named.is_empty());
    }

    #[test]
    fn test_namespace_reexport_is_named() {
        let map = shape("export * as utils from './utils'");
        assert!(!map.is_dynamic);
        assert_eq!(named(&map), ["utils"]);
    }

    #[test]
    fn test_live_bindings() {
        assert!(shape("export let count = 0;").live_bindings);
        assert!(shape("var total = 0; export { total }").live_bindings);
        assert!(!shape("const fixed = 0; export { fixed }").live_bindings);
    }

    #[test]
    fn test_type_exports_excluded() {
        let map = shape(
            "export type A = string; export interface B {} export type { C } from './c'; export enum D { X }",
        );
        assert_eq!(named(&map), ["D"]);
    }

    #[test]
    fn test_commonjs_is_dynamic() {
        let map = extract_exports("module.exports = { a: 1 }", "/p/legacy.js").unwrap();
        assert!(map.is_dynamic);
    }

    #[test]
    fn test_parse_error() {
        let err = extract_exports("export const = ;", "/p/broken.js").unwrap_err();
        assert!(matches!(err, InteropError::Parse { .. }));
    }
}
