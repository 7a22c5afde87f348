//! Detection of `import.meta.hot.accept` calls.

use memchr::memmem;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;

use super::source_type_for;

/// True when the module accepts its own updates.
///
/// Looks for a real `import.meta.hot.accept()` or `import.meta.hot.accept(cb)`
/// call in the parsed module, so text inside comments and strings does not
/// count. Accepting dependencies (`accept("./dep", cb)`, `accept([...])`) is
/// not self acceptance. Sources that do not parse never accept.
pub fn is_self_accepting(source: &str, path: &str) -> bool {
    if memmem::find(source.as_bytes(), b"accept").is_none() {
        return false;
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return false;
    }

    let mut visitor = AcceptVisitor::default();
    visitor.visit_program(&ret.program);
    visitor.accepts
}

#[derive(Default)]
struct AcceptVisitor {
    accepts: bool,
}

impl<'a> Visit<'a> for AcceptVisitor {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_hot_accept(call) && accepts_self(call) {
            self.accepts = true;
        }
        walk::walk_call_expression(self, call);
    }
}

/// `import.meta.hot.accept`, optionally chained (`import.meta.hot?.accept`).
fn is_hot_accept(call: &CallExpression<'_>) -> bool {
    let Expression::StaticMemberExpression(accept) = call.callee.get_inner_expression() else {
        return false;
    };
    if accept.property.name != "accept" {
        return false;
    }
    let Expression::StaticMemberExpression(hot) = accept.object.get_inner_expression() else {
        return false;
    };
    if hot.property.name != "hot" {
        return false;
    }
    matches!(
        hot.object.get_inner_expression(),
        Expression::MetaProperty(meta)
            if meta.meta.name == "import" && meta.property.name == "meta"
    )
}

fn accepts_self(call: &CallExpression<'_>) -> bool {
    !matches!(
        call.arguments.first(),
        Some(
            Argument::StringLiteral(_)
                | Argument::TemplateLiteral(_)
                | Argument::ArrayExpression(_)
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(source: &str) -> bool {
        is_self_accepting(source, "/p/src/view.ts")
    }

    #[test]
    fn test_bare_and_callback_accept() {
        assert!(accepts("import.meta.hot.accept()"));
        assert!(accepts("if (import.meta.hot) { import.meta.hot.accept((m) => {}) }"));
        assert!(accepts("import.meta.hot?.accept(function (m) {})"));
        assert!(accepts("const cb = () => {};\nimport.meta.hot.accept(cb);"));
    }

    #[test]
    fn test_dependency_accept_is_not_self() {
        assert!(!accepts("import.meta.hot.accept('./dep', () => {})"));
        assert!(!accepts("import.meta.hot.accept([\"./a\"], cb)"));
        assert!(!accepts("import.meta.hot.accept(`./dep`)"));
    }

    #[test]
    fn test_comments_and_strings_do_not_accept() {
        assert!(!accepts("// import.meta.hot.accept()\nexport const x = 1;"));
        assert!(!accepts("/* import.meta.hot.accept() */ export const x = 1;"));
        assert!(!accepts("export const doc = 'call import.meta.hot.accept() to opt in';"));
        assert!(!accepts("export const doc = `import.meta.hot.accept()`;"));
    }

    #[test]
    fn test_other_receivers_do_not_accept() {
        assert!(!accepts("const hot = { accept() {} };\nhot.accept();"));
        assert!(!accepts("import.meta.hot.decline()"));
        assert!(!accepts("export const x = 1"));
    }

    #[test]
    fn test_typescript_and_jsx_sources_parse() {
        assert!(is_self_accepting(
            "export const n: number = 1;\nimport.meta.hot.accept();",
            "/p/src/n.ts"
        ));
        assert!(is_self_accepting(
            "export default function App() { return <div />; }\nimport.meta.hot.accept();",
            "/p/src/app.tsx"
        ));
    }

    #[test]
    fn test_unparseable_source_does_not_accept() {
        assert!(!accepts("import.meta.hot.accept(\nexport const = ;"));
    }
}
