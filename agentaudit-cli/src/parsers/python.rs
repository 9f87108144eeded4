//! Python parser using tree-sitter
//!
//! Extracts classes, functions, methods, decorators, imports and docstrings
//! from Python source code.

use super::{compact, ensure_well_formed, line_of, node_text, ParseError, StructuralParser};
use crate::config::Language;
use crate::models::{Callable, ModuleFacts, TypeDecl};
use tree_sitter::{Node, Parser};

/// Structural parser for Python modules
pub struct PythonParser;

impl StructuralParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, source: &str) -> Result<ModuleFacts, ParseError> {
        parse_source(source)
    }
}

/// Parse Python source code into raw structural facts
pub fn parse_source(source: &str) -> Result<ModuleFacts, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseError::Grammar {
            language: Language::Python,
            reason: e.to_string(),
        })?;

    let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;
    let root = tree.root_node();
    ensure_well_formed(root)?;

    let mut facts = ModuleFacts {
        has_module_docstring: block_has_docstring(root),
        branch_count: count_branches(root),
        ..Default::default()
    };
    collect_definitions(root, source, None, &mut facts);
    collect_imports(root, source, &mut facts.imports);

    Ok(facts)
}

/// Collect classes and functions declared directly in a module or class body
fn collect_definitions(container: Node, source: &str, owner: Option<&str>, facts: &mut ModuleFacts) {
    let mut cursor = container.walk();
    for child in container.named_children(&mut cursor) {
        let (definition, decorators) = if child.kind() == "decorated_definition" {
            let Some(definition) = child.child_by_field_name("definition") else {
                continue;
            };
            (definition, decorator_names(child, source))
        } else {
            (child, Vec::new())
        };

        match definition.kind() {
            "class_definition" if owner.is_none() => {
                if let Some(decl) = parse_class(definition, source, decorators, facts) {
                    facts.types.push(decl);
                }
            }
            "function_definition" => {
                if let Some(callable) = parse_function(definition, source, owner, decorators) {
                    facts.callables.push(callable);
                }
            }
            _ => {}
        }
    }
}

/// Parse a class and its methods; methods are pushed into `facts.callables`
fn parse_class(
    node: Node,
    source: &str,
    decorators: Vec<String>,
    facts: &mut ModuleFacts,
) -> Option<TypeDecl> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();
    let body = node.child_by_field_name("body");

    let before = facts.callables.len();
    if let Some(body) = body {
        collect_definitions(body, source, Some(&name), facts);
    }
    let methods = facts.callables[before..]
        .iter()
        .map(|c| c.name.clone())
        .collect();

    Some(TypeDecl {
        line: line_of(node),
        bases: extract_bases(node, source),
        decorators,
        has_docstring: body.is_some_and(block_has_docstring),
        methods,
        name,
    })
}

/// Extract base class names, skipping keyword arguments like `metaclass=...`
fn extract_bases(class_node: Node, source: &str) -> Vec<String> {
    let Some(args) = class_node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "identifier" | "attribute" => bases.push(node_text(arg, source).to_string()),
            "subscript" => {
                // Generic[T] - keep the base
                if let Some(value) = arg.child_by_field_name("value") {
                    bases.push(node_text(value, source).to_string());
                }
            }
            _ => {}
        }
    }
    bases
}

fn parse_function(
    node: Node,
    source: &str,
    owner: Option<&str>,
    decorators: Vec<String>,
) -> Option<Callable> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();

    let is_async = {
        let mut cursor = node.walk();
        let first = node.children(&mut cursor).next();
        first.is_some_and(|c| c.kind() == "async")
    };

    let (param_count, annotated_params) =
        count_parameters(node.child_by_field_name("parameters"), source, owner.is_some());

    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| compact(node_text(n, source)));

    let body = node.child_by_field_name("body");
    let mut scan = BodyScan::default();
    if let Some(body) = body {
        scan.visit(body, source, false);
    }

    Some(Callable {
        name,
        owner: owner.map(str::to_string),
        line: line_of(node),
        is_async,
        decorators,
        return_type,
        param_count,
        annotated_params,
        has_docstring: body.is_some_and(block_has_docstring),
        branch_count: scan.branches,
        has_try: scan.has_try,
        calls: scan.calls,
        handler_calls: scan.handler_calls,
        handler_returns: scan.handler_returns,
    })
}

/// Count (parameters, annotated parameters), excluding a method's `self`/`cls`
fn count_parameters(params: Option<Node>, source: &str, is_method: bool) -> (usize, usize) {
    let Some(params) = params else {
        return (0, 0);
    };

    let mut total = 0;
    let mut annotated = 0;
    let mut cursor = params.walk();
    for (index, param) in params.named_children(&mut cursor).enumerate() {
        let name = match param.kind() {
            "identifier" => node_text(param, source),
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .map(|n| node_text(n, source))
                .unwrap_or(""),
            "typed_parameter" => {
                let mut inner = param.walk();
                let first = param.named_children(&mut inner).next();
                first.map(|n| node_text(n, source)).unwrap_or("")
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => node_text(param, source),
            // `*`, `/` separators and comments
            _ => continue,
        };

        if index == 0 && is_method && (name == "self" || name == "cls") {
            continue;
        }

        total += 1;
        if matches!(param.kind(), "typed_parameter" | "typed_default_parameter") {
            annotated += 1;
        }
    }

    (total, annotated)
}

/// Decorator names without `@` and call arguments, e.g. `retry` for `@retry(times=3)`
fn decorator_names(decorated: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = decorated.walk();
    for child in decorated.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        let text = node_text(child, source).trim_start_matches('@');
        let name = text.split('(').next().unwrap_or("");
        names.push(compact(name));
    }
    names
}

/// True when the first statement of a block (or module) is a string literal
fn block_has_docstring(block: Node) -> bool {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    let Some(statement) = first else {
        return false;
    };
    if statement.kind() != "expression_statement" {
        return false;
    }
    let mut inner = statement.walk();
    let expr = statement.named_children(&mut inner).next();
    expr.is_some_and(|e| matches!(e.kind(), "string" | "concatenated_string"))
}

/// Collect import targets anywhere in the module (including guarded imports)
fn collect_imports(node: Node, source: &str, imports: &mut Vec<String>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                if let Some(path) = imported_path(name, source) {
                    imports.push(path);
                }
            }
            return;
        }
        "import_from_statement" => {
            let module = node
                .child_by_field_name("module_name")
                .map(|n| compact(node_text(n, source)))
                .unwrap_or_default();

            let mut names = Vec::new();
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                if let Some(path) = imported_path(name, source) {
                    names.push(path);
                }
            }

            if names.is_empty() {
                // `from x import *`
                imports.push(module);
            } else {
                for name in names {
                    if module.ends_with('.') {
                        imports.push(format!("{module}{name}"));
                    } else {
                        imports.push(format!("{module}.{name}"));
                    }
                }
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_imports(child, source, imports);
    }
}

fn imported_path(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "dotted_name" => Some(compact(node_text(node, source))),
        "aliased_import" => node
            .child_by_field_name("name")
            .map(|n| compact(node_text(n, source))),
        _ => None,
    }
}

/// Branch points contributing to complexity
fn branch_weight(node: Node) -> u32 {
    match node.kind() {
        "if_statement" | "elif_clause" | "while_statement" | "for_statement" => 1,
        "except_clause" => 1,
        "boolean_operator" | "conditional_expression" => 1,
        // Comprehension filters and match arms
        "if_clause" | "case_clause" => 1,
        "with_statement" | "assert_statement" => 1,
        _ => 0,
    }
}

fn count_branches(node: Node) -> u32 {
    let mut total = branch_weight(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        total += count_branches(child);
    }
    total
}

/// Facts gathered from one function body
#[derive(Default)]
struct BodyScan {
    branches: u32,
    has_try: bool,
    calls: Vec<String>,
    handler_calls: Vec<String>,
    handler_returns: bool,
}

impl BodyScan {
    fn visit(&mut self, node: Node, source: &str, in_handler: bool) {
        match node.kind() {
            // Nested classes are not part of this callable
            "class_definition" => return,
            "try_statement" => self.has_try = true,
            "return_statement" if in_handler => self.handler_returns = true,
            "call" => {
                if let Some(function) = node.child_by_field_name("function") {
                    let target = compact(node_text(function, source));
                    if in_handler {
                        self.handler_calls.push(target.clone());
                    }
                    self.calls.push(target);
                }
            }
            _ => {}
        }
        self.branches += branch_weight(node);

        let in_handler = in_handler || node.kind() == "except_clause";
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, source, in_handler);
        }
    }
}
