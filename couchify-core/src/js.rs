//! JavaScript parsing on top of tree-sitter.
//!
//! Every parse gets its own `Parser`, so concurrent tasks never share parser
//! state.

use std::ops::Range;
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

#[derive(Error, Debug)]
pub enum JsError {
    #[error("Failed to set JavaScript language for parser: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Failed to parse source")]
    Parse,

    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// Parse JavaScript, tolerating syntax errors
pub fn parse(source: &str) -> Result<Tree, JsError> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;
    parser.parse(source, None).ok_or(JsError::Parse)
}

/// Parse JavaScript, failing on the first syntax error
pub fn parse_strict(source: &str) -> Result<Tree, JsError> {
    let tree = parse(source)?;
    if let Some(node) = first_error(tree.root_node()) {
        let pos = node.start_position();
        return Err(JsError::Syntax {
            line: pos.row + 1,
            column: pos.column + 1,
        });
    }
    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find_map(first_error);
    found.or(Some(node))
}

/// Source text covered by a node
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// A `require('<literal>')` call found in a source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireCall {
    /// The module reference as written, without quotes
    pub literal: String,
    /// Byte range of the quoted string argument
    pub range: Range<usize>,
}

/// All `require` calls with a single string-literal argument, in source order
pub fn require_calls(tree: &Tree, source: &str) -> Vec<RequireCall> {
    let mut calls = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        if node.kind() == "call_expression" {
            if let Some(call) = require_call(node, source) {
                calls.push(call);
            }
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return calls;
            }
        }
    }
}

fn require_call(node: Node, source: &str) -> Option<RequireCall> {
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "identifier" || node_text(callee, source) != "require" {
        return None;
    }

    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let args: Vec<Node> = arguments
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();

    match args.as_slice() {
        [arg] if arg.kind() == "string" => Some(RequireCall {
            literal: string_value(*arg, source),
            range: arg.byte_range(),
        }),
        _ => None,
    }
}

/// Decoded value of a `string` node
pub fn string_value(node: Node, source: &str) -> String {
    let mut value = String::new();
    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        let text = node_text(part, source);
        match part.kind() {
            "escape_sequence" => value.push_str(&decode_escape(text)),
            _ => value.push_str(text),
        }
    }
    value
}

fn decode_escape(seq: &str) -> String {
    let mut chars = seq.chars();
    chars.next();
    match chars.next() {
        Some('n') => "\n".to_string(),
        Some('t') => "\t".to_string(),
        Some('r') => "\r".to_string(),
        Some('0') => "\0".to_string(),
        Some(c) if chars.as_str().is_empty() => c.to_string(),
        _ => seq.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(source: &str) -> Vec<String> {
        let tree = parse(source).unwrap();
        require_calls(&tree, source)
            .into_iter()
            .map(|c| c.literal)
            .collect()
    }

    #[test]
    fn test_finds_nested_requires_in_order() {
        let src = r#"
var a = require('./a')
function f() { return require("../b/c").x }
"#;
        assert_eq!(literals(src), vec!["./a", "../b/c"]);
    }

    #[test]
    fn test_ignores_non_literal_and_member_requires() {
        let src = "require(name); obj.require('./x'); require('./a', 1); require(`./t`)";
        assert!(literals(src).is_empty());
    }

    #[test]
    fn test_ignores_requires_in_strings_and_comments() {
        let src = "// require('./a')\nvar s = \"require('./b')\";";
        assert!(literals(src).is_empty());
    }

    #[test]
    fn test_range_covers_quotes() {
        let src = "require('./a')";
        let tree = parse(src).unwrap();
        let calls = require_calls(&tree, src);
        assert_eq!(&src[calls[0].range.clone()], "'./a'");
    }

    #[test]
    fn test_parse_strict_reports_position() {
        let err = parse_strict("var a = ;\n").unwrap_err();
        assert!(matches!(err, JsError::Syntax { line: 1, .. }));
        assert!(parse_strict("var a = 1;").is_ok());
    }
}
