//! Source transforms applied to module text before dependency discovery.
//!
//! Transforms are looked up by name from the configuration:
//!
//! - `es-modules` (default) - lowers ES `import` and `export` statements to
//!   `require` calls and CommonJS assignments so the export extractor and the
//!   require walker see plain CommonJS modules.

use crate::js::{self, node_text, JsError};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tree_sitter::Node;

/// Name of the built-in ES module transform
pub const ES_MODULES: &str = "es-modules";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("unknown source transform: {0}")]
    Unknown(String),

    #[error("{transform} failed on {path}: {message}")]
    Failed {
        transform: String,
        path: String,
        message: String,
    },

    #[error(transparent)]
    Js(#[from] JsError),
}

/// A source-to-source rewrite run on every module before its references are scanned
pub trait SourceTransform: Send + Sync {
    /// Name of this transform (e.g., "es-modules")
    fn name(&self) -> &str;

    fn transform(&self, path: &Path, source: &str) -> Result<String, TransformError>;
}

/// Get a built-in transform by name
pub fn builtin(name: &str) -> Option<Arc<dyn SourceTransform>> {
    match name {
        ES_MODULES => Some(Arc::new(EsModules)),
        _ => None,
    }
}

pub fn is_builtin(name: &str) -> bool {
    available_transforms().contains(&name)
}

/// List names of all built-in transforms
pub fn available_transforms() -> Vec<&'static str> {
    vec![ES_MODULES]
}

/// Ordered list of transforms; cheap to clone into concurrent tasks
#[derive(Clone, Default)]
pub struct TransformChain {
    transforms: Vec<Arc<dyn SourceTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain of built-in transforms, in the given order
    pub fn from_names(names: &[String]) -> Result<Self, TransformError> {
        let transforms = names
            .iter()
            .map(|name| builtin(name).ok_or_else(|| TransformError::Unknown(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { transforms })
    }

    /// Append a transform to the end of the chain
    pub fn with(mut self, transform: impl SourceTransform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn apply(&self, path: &Path, source: String) -> Result<String, TransformError> {
        self.transforms
            .iter()
            .try_fold(source, |src, t| t.transform(path, &src))
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.transforms.iter().map(|t| t.name()))
            .finish()
    }
}

/// Lowers top-level ES imports and exports to CommonJS
///
/// `export default <expr>` becomes `module.exports = <expr>` and
/// `export const x = <expr>` becomes `var x = exports.x = <expr>;`, the
/// shapes the export extractor recognizes. Re-exports and export lists are
/// rejected.
///
/// Imports become `require` bindings. A default import binds the whole
/// module, matching what `export default` lowers to:
///
/// - `import x from 's'` and `import * as x from 's'` -> `var x = require('s');`
/// - `import { a as b } from 's'` -> `var b = require('s').a;`
/// - `import 's'` -> `require('s');`
pub struct EsModules;

impl SourceTransform for EsModules {
    fn name(&self) -> &str {
        ES_MODULES
    }

    fn transform(&self, path: &Path, source: &str) -> Result<String, TransformError> {
        if !source.contains("export") && !source.contains("import") {
            return Ok(source.to_string());
        }

        let tree = js::parse(source)?;
        let root = tree.root_node();
        // Leave broken sources alone; the graph walker reports the syntax error
        if root.has_error() {
            return Ok(source.to_string());
        }

        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            let (edit, what) = match stmt.kind() {
                "export_statement" => (lower_export(stmt, source), "export"),
                "import_statement" => (lower_import(stmt, source), "import"),
                _ => continue,
            };
            let edit = edit.ok_or_else(|| TransformError::Failed {
                transform: ES_MODULES.to_string(),
                path: path.display().to_string(),
                message: format!("unsupported {}: {}", what, first_line(node_text(stmt, source))),
            })?;
            edits.push(edit);
        }

        Ok(apply_edits(source, edits))
    }
}

fn lower_export(stmt: Node, source: &str) -> Option<(Range<usize>, String)> {
    if stmt.child_by_field_name("source").is_some() {
        return None;
    }

    let mut cursor = stmt.walk();
    let is_default = stmt.children(&mut cursor).any(|c| c.kind() == "default");

    if is_default {
        let target = stmt
            .child_by_field_name("value")
            .or_else(|| stmt.child_by_field_name("declaration"))?;
        return Some((
            stmt.start_byte()..target.start_byte(),
            "module.exports = ".to_string(),
        ));
    }

    let declaration = stmt.child_by_field_name("declaration")?;
    let lowered = match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = declaration.walk();
            let parts = declaration
                .named_children(&mut cursor)
                .filter(|d| d.kind() == "variable_declarator")
                .map(|d| {
                    let name = d.child_by_field_name("name")?;
                    if name.kind() != "identifier" {
                        return None;
                    }
                    let name = node_text(name, source);
                    let value = d
                        .child_by_field_name("value")
                        .map(|v| node_text(v, source))
                        .unwrap_or("undefined");
                    Some(format!("var {name} = exports.{name} = {value};"))
                })
                .collect::<Option<Vec<_>>>()?;
            parts.join("\n")
        }
        "function_declaration" | "class_declaration" => {
            let name = node_text(declaration.child_by_field_name("name")?, source);
            format!(
                "var {name} = exports.{name} = {};",
                node_text(declaration, source)
            )
        }
        _ => return None,
    };

    Some((stmt.byte_range(), lowered))
}

fn lower_import(stmt: Node, source: &str) -> Option<(Range<usize>, String)> {
    let specifier = stmt.child_by_field_name("source")?;
    let require = format!("require({})", node_text(specifier, source));

    let mut cursor = stmt.walk();
    let clause = stmt
        .named_children(&mut cursor)
        .find(|c| c.kind() == "import_clause");
    let Some(clause) = clause else {
        return Some((stmt.byte_range(), format!("{};", require)));
    };

    let mut bindings = Vec::new();
    let mut cursor = clause.walk();
    for part in clause.named_children(&mut cursor) {
        match part.kind() {
            "identifier" => bindings.push(format!("var {} = {};", node_text(part, source), require)),
            "namespace_import" => {
                let mut inner = part.walk();
                let local = part
                    .named_children(&mut inner)
                    .find(|c| c.kind() == "identifier")?;
                bindings.push(format!("var {} = {};", node_text(local, source), require));
            }
            "named_imports" => {
                let mut inner = part.walk();
                for item in part.named_children(&mut inner) {
                    if item.kind() != "import_specifier" {
                        continue;
                    }
                    let name = item.child_by_field_name("name")?;
                    let local = item.child_by_field_name("alias").unwrap_or(name);
                    if local.kind() != "identifier" {
                        return None;
                    }
                    let member = match name.kind() {
                        "identifier" if node_text(name, source) == "default" => String::new(),
                        "identifier" => format!(".{}", node_text(name, source)),
                        "string" => format!("[{}]", node_text(name, source)),
                        _ => return None,
                    };
                    bindings.push(format!(
                        "var {} = {}{};",
                        node_text(local, source),
                        require,
                        member
                    ));
                }
            }
            "comment" => {}
            _ => return None,
        }
    }

    // `import {} from 's'` still loads the module
    if bindings.is_empty() {
        bindings.push(format!("{};", require));
    }
    Some((stmt.byte_range(), bindings.join(" ")))
}

fn apply_edits(source: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for (range, text) in edits {
        out.push_str(&source[last..range.start]);
        out.push_str(&text);
        last = range.end;
    }
    out.push_str(&source[last..]);
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(src: &str) -> String {
        EsModules.transform(Path::new("m.js"), src).unwrap()
    }

    #[test]
    fn test_commonjs_passes_through() {
        let src = "module.exports = function (doc) { return 1 }\n";
        assert_eq!(lower(src), src);
    }

    #[test]
    fn test_export_default_function() {
        assert_eq!(
            lower("export default function (doc) { return 1 }\n"),
            "module.exports = function (doc) { return 1 }\n"
        );
    }

    #[test]
    fn test_export_const_functions() {
        let src = "export const map = function (doc) { emit(doc._id) }\nexport const reduce = '_count'\n";
        assert_eq!(
            lower(src),
            "var map = exports.map = function (doc) { emit(doc._id) };\nvar reduce = exports.reduce = '_count';\n"
        );
    }

    #[test]
    fn test_export_function_declaration() {
        assert_eq!(
            lower("export function map(doc) { emit(doc) }"),
            "var map = exports.map = function map(doc) { emit(doc) };"
        );
    }

    #[test]
    fn test_default_and_namespace_imports() {
        assert_eq!(
            lower("import util from '../lib/util';\nexport default function () { return util }"),
            "var util = require('../lib/util');\nmodule.exports = function () { return util }"
        );
        assert_eq!(
            lower("import * as fmt from \"./fmt\"\nfmt.date()"),
            "var fmt = require(\"./fmt\");\nfmt.date()"
        );
    }

    #[test]
    fn test_named_imports() {
        assert_eq!(
            lower("import { a, b as c } from './m';"),
            "var a = require('./m').a; var c = require('./m').b;"
        );
        assert_eq!(
            lower("import x, { y } from './m';"),
            "var x = require('./m'); var y = require('./m').y;"
        );
    }

    #[test]
    fn test_side_effect_import() {
        assert_eq!(lower("import './setup';\n"), "require('./setup');\n");
    }

    #[test]
    fn test_lowered_imports_are_seen_as_requires() {
        let out = lower("import a from './a';\nimport { b } from './b';\n");
        let tree = js::parse(&out).unwrap();
        let literals: Vec<String> = js::require_calls(&tree, &out)
            .into_iter()
            .map(|call| call.literal)
            .collect();
        assert_eq!(literals, vec!["./a", "./b"]);
    }

    #[test]
    fn test_reexport_is_rejected() {
        let err = EsModules
            .transform(Path::new("m.js"), "export { a } from './a'\n")
            .unwrap_err();
        assert!(err.to_string().contains("unsupported export"));
    }

    #[test]
    fn test_chain_from_names() {
        let chain = TransformChain::from_names(&["es-modules".to_string()]).unwrap();
        assert!(!chain.is_empty());
        let out = chain
            .apply(Path::new("m.js"), "export default 1;".to_string())
            .unwrap();
        assert_eq!(out, "module.exports = 1;");

        assert!(matches!(
            TransformChain::from_names(&["nope".to_string()]),
            Err(TransformError::Unknown(_))
        ));
    }
}
