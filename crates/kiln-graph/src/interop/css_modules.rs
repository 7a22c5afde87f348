//! Lightweight stylesheet scanning.
//!
//! Only two facts are pulled out of CSS: `@import` edges (with their cascade
//! layer) and, for CSS modules, the class names that become exports.

use std::collections::BTreeSet;

use memchr::memmem;

use crate::edge::EdgeSpec;

/// `@import` rules in source order.
///
/// `@import "a.css" layer(base);` becomes a css-layer edge carrying the layer
/// name; a bare `layer` keyword yields an anonymous layer. Everything else is
/// a plain css-import edge.
pub fn scan_css_imports(source: &str) -> Vec<EdgeSpec> {
    let text = strip_comments(source);
    let mut edges = Vec::new();

    for pos in memmem::find_iter(text.as_bytes(), b"@import") {
        let rest = text[pos + "@import".len()..].trim_start();
        let Some((specifier, tail)) = import_target(rest) else {
            continue;
        };
        let order = edges.len() as u32;
        let conditions = tail.split(';').next().unwrap_or_default();

        let edge = match layer_condition(conditions) {
            Some(layer) => EdgeSpec::css_layer(specifier, layer, order),
            None => EdgeSpec::css_import(specifier, order),
        };
        edges.push(edge);
    }

    edges
}

/// Class selectors of a CSS module, sorted and deduplicated.
pub fn css_module_classes(source: &str) -> BTreeSet<String> {
    let text = strip_comments(source);
    let mut classes = BTreeSet::new();
    // true while inside a declaration block, false inside at-rule blocks
    let mut blocks: Vec<bool> = Vec::new();
    let mut prelude_start = 0;

    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => {
                let prelude = text[prelude_start..idx].trim();
                let in_declarations = blocks.last().copied().unwrap_or(false);
                let is_rule = !prelude.starts_with('@') && !in_declarations;
                if is_rule {
                    collect_classes(prelude, &mut classes);
                }
                blocks.push(is_rule || in_declarations);
                prelude_start = idx + 1;
            }
            '}' => {
                blocks.pop();
                prelude_start = idx + 1;
            }
            ';' => prelude_start = idx + 1,
            _ => {}
        }
    }

    classes
}

fn collect_classes(selector: &str, out: &mut BTreeSet<String>) {
    let bytes = selector.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'.' && bytes.get(i + 1).is_some_and(|b| is_ident_start(*b)) {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_ident_char(bytes[end]) {
                end += 1;
            }
            out.insert(selector[start..end].to_string());
            i = end;
        } else {
            i += 1;
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'-'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Split `"x.css" layer(base);` into the target and the remaining conditions.
fn import_target(rest: &str) -> Option<(&str, &str)> {
    if let Some(inner) = rest.strip_prefix("url(") {
        let close = inner.find(')')?;
        let target = inner[..close].trim().trim_matches(|c| c == '"' || c == '\'');
        return Some((target, &inner[close + 1..]));
    }

    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[1..];
    let close = body.find(quote)?;
    Some((&body[..close], &body[close + 1..]))
}

fn layer_condition(conditions: &str) -> Option<Option<String>> {
    let conditions = conditions.trim_start();
    if let Some(inner) = conditions.strip_prefix("layer(") {
        let close = inner.find(')')?;
        return Some(Some(inner[..close].trim().to_string()));
    }
    let keyword = conditions.split_whitespace().next()?;
    (keyword == "layer").then_some(None)
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeKind;

    #[test]
    fn test_import_forms() {
        let edges = scan_css_imports(
            r#"
            @import "./reset.css";
            @import url('./theme.css');
            /* @import "./commented.css"; */
            @import "./base.css" layer(base);
            @import url(./anon.css) layer;
            "#,
        );
        let specs: Vec<_> = edges.iter().map(|e| e.specifier.as_str()).collect();
        assert_eq!(specs, ["./reset.css", "./theme.css", "./base.css", "./anon.css"]);
        assert_eq!(edges[0].kind, EdgeKind::CssImport);
        assert_eq!(edges[2].kind, EdgeKind::CssLayer);
        let precedence = edges[2].precedence.as_ref().unwrap();
        assert_eq!(precedence.layer.as_deref(), Some("base"));
        assert_eq!(precedence.source_order, 2);
        assert_eq!(edges[3].kind, EdgeKind::CssLayer);
        assert_eq!(edges[3].precedence.as_ref().unwrap().layer, None);
    }

    #[test]
    fn test_classes_skip_declarations_and_at_rules() {
        let classes = css_module_classes(
            r#"
            .title { background: url(./a.png); width: 1.5em; }
            @media (min-width: 10px) { .wide > .inner { color: red } }
            /* .ghost {} */
            "#,
        );
        assert_eq!(
            classes.into_iter().collect::<Vec<_>>(),
            ["inner", "title", "wide"]
        );
    }
}
