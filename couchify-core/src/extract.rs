//! Export extraction: turns an entry module into self-invoking function fragments.
//!
//! Two top-level statement shapes are recognized:
//!
//! - `module.exports = function (...) { ... }` - the default export used by
//!   filters, lists, shows and updates
//! - `var map = exports.map = function (...) { ... }` - named exports, used by
//!   views for their `map` and `reduce` functions
//!
//! The matched statement is replaced by the contents of the function body and
//! the whole module is wrapped as `(function(){ ... }())`.

use crate::js::{self, node_text, JsError};
use couchify_types::Category;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use tree_sitter::Node;

/// Key of the single export of non-view design functions
pub const DEFAULT_EXPORT: &str = "default";

/// Named exports a view may define
pub const VIEW_EXPORTS: [&str; 2] = ["map", "reduce"];

static USE_STRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^['"]+use strict['"]+;?"#).expect("valid regex"));

static ES_MODULE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^Object\.defineProperty\(\s*exports\s*,\s*['"]__esModule['"]\s*,\s*\{\s*value\s*:\s*(?:true|!0)\s*\}\s*\);?"#,
    )
    .expect("valid regex")
});

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("a design document did not export a default function: {0}")]
    NoExport(String),

    #[error("Failed to parse {path}: {source}")]
    Parse { path: String, source: JsError },
}

/// Export shape a design function file must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportShape {
    /// `module.exports = function ...`
    Default,
    /// `var map = exports.map = function ...` and the same for `reduce`
    Named,
}

impl ExportShape {
    pub fn for_category(category: Category) -> Self {
        if category.is_view() {
            ExportShape::Named
        } else {
            ExportShape::Default
        }
    }
}

/// A recognized top-level export statement
enum ExportStatement<'t> {
    ModuleExports {
        statement: Node<'t>,
        body: Node<'t>,
    },
    Named {
        name: String,
        statement: Node<'t>,
        body: Node<'t>,
    },
}

/// Extract the exported function fragments of `source`
///
/// `label` names the file in errors. Returns export name -> fragment text; the
/// default shape yields a single `default` key.
pub fn extract_exports(
    label: &str,
    source: &str,
    shape: ExportShape,
) -> Result<BTreeMap<String, String>, ExtractError> {
    let tree = js::parse_strict(source).map_err(|source| ExtractError::Parse {
        path: label.to_string(),
        source,
    })?;
    let root = tree.root_node();

    let mut exports = BTreeMap::new();
    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        match (shape, classify(stmt, source)) {
            (ExportShape::Default, Some(ExportStatement::ModuleExports { statement, body })) => {
                exports.insert(
                    DEFAULT_EXPORT.to_string(),
                    build_fragment(source, statement, body),
                );
                break;
            }
            (ExportShape::Named, Some(ExportStatement::Named { name, statement, body })) => {
                if !VIEW_EXPORTS.contains(&name.as_str()) {
                    tracing::warn!("{}: ignoring export '{}'", label, name);
                    continue;
                }
                let fragment = build_fragment(source, statement, body);
                exports.insert(name, fragment);
            }
            _ => {}
        }
    }

    if exports.is_empty() {
        return Err(ExtractError::NoExport(label.to_string()));
    }

    tracing::debug!("Extracted exports {:?} from {}", exports.keys(), label);
    Ok(exports)
}

fn classify<'t>(stmt: Node<'t>, source: &str) -> Option<ExportStatement<'t>> {
    match stmt.kind() {
        "expression_statement" => {
            let expr = first_named_child(stmt)?;
            if expr.kind() != "assignment_expression" {
                return None;
            }
            let left = expr.child_by_field_name("left")?;
            let right = expr.child_by_field_name("right")?;
            if !is_member(left, source, |object| object == "module", "exports") {
                return None;
            }
            Some(ExportStatement::ModuleExports {
                statement: stmt,
                body: function_body(right)?,
            })
        }
        "lexical_declaration" | "variable_declaration" => {
            let declarator = first_named_child(stmt)?;
            if declarator.kind() != "variable_declarator" {
                return None;
            }
            let name = declarator.child_by_field_name("name")?;
            if name.kind() != "identifier" {
                return None;
            }
            let name = node_text(name, source);

            let value = declarator.child_by_field_name("value")?;
            if value.kind() != "assignment_expression" {
                return None;
            }
            let left = value.child_by_field_name("left")?;
            let right = value.child_by_field_name("right")?;
            if !is_member(left, source, |object| object == "exports", name) {
                return None;
            }
            Some(ExportStatement::Named {
                name: name.to_string(),
                statement: stmt,
                body: function_body(right)?,
            })
        }
        _ => None,
    }
}

fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let child = node
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    child
}

fn is_member(node: Node, source: &str, object: impl Fn(&str) -> bool, property: &str) -> bool {
    if node.kind() != "member_expression" {
        return false;
    }
    let (Some(obj), Some(prop)) = (
        node.child_by_field_name("object"),
        node.child_by_field_name("property"),
    ) else {
        return false;
    };
    obj.kind() == "identifier" && object(node_text(obj, source)) && node_text(prop, source) == property
}

fn function_body(node: Node) -> Option<Node> {
    match node.kind() {
        "function_expression" | "function" => node.child_by_field_name("body"),
        _ => None,
    }
}

/// Text between the braces of a statement block, without surrounding blank space
fn body_contents<'s>(body: Node, source: &'s str) -> &'s str {
    let mut cursor = body.walk();
    let inner: Vec<Node> = body
        .children(&mut cursor)
        .filter(|c| c.kind() != "{" && c.kind() != "}")
        .collect();
    match (inner.first(), inner.last()) {
        (Some(first), Some(last)) => &source[first.start_byte()..last.end_byte()],
        _ => "",
    }
}

fn build_fragment(source: &str, statement: Node, body: Node) -> String {
    let code = format!(
        "{}{}{}",
        &source[..statement.start_byte()],
        body_contents(body, source),
        &source[statement.end_byte()..]
    );
    wrap_iife(&strip_module_prologue(&code))
}

/// Drop a leading `"use strict"` pragma and ES module interop marker
pub fn strip_module_prologue(code: &str) -> String {
    let code = code.trim_start();
    let code = USE_STRICT.replace(code, "");
    let code = code.trim_start();
    let code = ES_MODULE_MARKER.replace(code, "");
    code.trim_start().to_string()
}

pub fn wrap_iife(body: &str) -> String {
    format!("(function(){{\n\n{}\n\n}}())", body)
}
