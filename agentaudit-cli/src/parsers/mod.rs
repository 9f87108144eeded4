//! Structural parsers using tree-sitter
//!
//! Each parser turns one source file's text into [`ModuleFacts`]: declared
//! types, callables, decorators, imports and docstrings. Nothing is
//! resolved across modules and nothing is executed.
//!
//! Parsers only extract raw facts. Coverage ratios and the complexity
//! estimate are derived by the module analyzer, which also owns the
//! degrade-on-failure contract.

pub mod python;
pub mod rust;

use crate::config::Language;
use crate::models::ModuleFacts;
use thiserror::Error;
use tree_sitter::Node;

/// Why a source file could not be turned into facts
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load {language} grammar: {reason}")]
    Grammar { language: Language, reason: String },

    #[error("parser produced no syntax tree")]
    NoTree,

    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// A pluggable per-language structural parser
///
/// The rest of the pipeline depends only on the language-neutral
/// [`ModuleFacts`] contract, so supporting another grammar means adding
/// one implementation of this trait.
pub trait StructuralParser: Send + Sync {
    fn language(&self) -> Language;

    /// Extract raw structural facts from one file's text
    fn parse(&self, source: &str) -> Result<ModuleFacts, ParseError>;
}

/// Get the parser for a language
pub fn parser_for(language: Language) -> Box<dyn StructuralParser> {
    match language {
        Language::Python => Box::new(python::PythonParser),
        Language::Rust => Box::new(rust::RustParser),
    }
}

/// Locate the first error or missing node, as 1-based (line, column)
pub(crate) fn first_syntax_error(node: Node) -> Option<(usize, usize)> {
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        return Some((pos.row + 1, pos.column + 1));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_syntax_error(child) {
            return Some(found);
        }
    }
    // has_error() without a located child: report the node itself
    let pos = node.start_position();
    Some((pos.row + 1, pos.column + 1))
}

/// Reject trees that contain syntax errors
pub(crate) fn ensure_well_formed(root: Node) -> Result<(), ParseError> {
    match first_syntax_error(root) {
        Some((line, column)) => Err(ParseError::Syntax { line, column }),
        None => Ok(()),
    }
}

/// Node text, empty on invalid UTF-8 boundaries
pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Collapse whitespace so multi-line call targets compare equal
pub(crate) fn compact(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("")
}

/// 1-based start line of a node
pub(crate) fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_for_language() {
        assert_eq!(parser_for(Language::Python).language(), Language::Python);
        assert_eq!(parser_for(Language::Rust).language(), Language::Rust);
    }

    #[test]
    fn test_syntax_error_is_reported_with_position() {
        let parser = parser_for(Language::Python);
        let err = parser
            .parse("def broken(:\n    pass\n")
            .expect_err("malformed source should not parse");
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }), "{err}");
    }

    #[test]
    fn test_compact_strips_whitespace() {
        assert_eq!(compact("self.logger\n    .info"), "self.logger.info");
    }
}
