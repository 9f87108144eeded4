//! Rust parser using tree-sitter
//!
//! Extracts structs, enums, traits, impl methods, attributes, `use`
//! declarations and doc comments from Rust source code.

use super::{compact, ensure_well_formed, line_of, node_text, ParseError, StructuralParser};
use crate::config::Language;
use crate::models::{Callable, ModuleFacts, TypeDecl};
use tree_sitter::{Node, Parser};

/// Combinators that put their arguments on an error path
const ERROR_COMBINATORS: &[&str] = &[
    "map_err",
    "or_else",
    "unwrap_or",
    "unwrap_or_else",
    "unwrap_or_default",
    "ok_or_else",
];

/// Combinators that substitute a fallback value
const FALLBACK_COMBINATORS: &[&str] = &["or_else", "unwrap_or", "unwrap_or_else", "unwrap_or_default"];

/// Structural parser for Rust modules
pub struct RustParser;

impl StructuralParser for RustParser {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn parse(&self, source: &str) -> Result<ModuleFacts, ParseError> {
        parse_source(source)
    }
}

/// Parse Rust source code into raw structural facts
pub fn parse_source(source: &str) -> Result<ModuleFacts, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_rust::LANGUAGE.into())
        .map_err(|e| ParseError::Grammar {
            language: Language::Rust,
            reason: e.to_string(),
        })?;

    let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;
    let root = tree.root_node();
    ensure_well_formed(root)?;

    let mut facts = ModuleFacts {
        branch_count: count_branches(root),
        ..Default::default()
    };
    let mut impls = Vec::new();
    collect_items(root, source, None, &mut facts, &mut impls);
    link_impls(&mut facts, &impls);

    Ok(facts)
}

/// An `impl [Trait for] Type` block seen while walking items
struct ImplBlock {
    type_name: String,
    trait_name: Option<String>,
}

/// Doc comments and attributes waiting for the item they annotate
#[derive(Default)]
struct Pending {
    doc: bool,
    attributes: Vec<String>,
}

/// Walk the items of a source file, module body, impl body or trait body
fn collect_items(
    container: Node,
    source: &str,
    owner: Option<&str>,
    facts: &mut ModuleFacts,
    impls: &mut Vec<ImplBlock>,
) {
    let mut pending = Pending::default();
    let mut cursor = container.walk();

    for child in container.named_children(&mut cursor) {
        match child.kind() {
            "line_comment" | "block_comment" => {
                let text = node_text(child, source);
                if text.starts_with("//!") || text.starts_with("/*!") {
                    facts.has_module_docstring = true;
                } else if (text.starts_with("///") && !text.starts_with("////"))
                    || (text.starts_with("/**") && !text.starts_with("/***"))
                {
                    pending.doc = true;
                }
                continue;
            }
            "attribute_item" => {
                let name = attribute_name(node_text(child, source));
                if name == "doc" {
                    pending.doc = true;
                } else {
                    pending.attributes.push(name);
                }
                continue;
            }
            "function_item" => {
                let pending = std::mem::take(&mut pending);
                if let Some(callable) = parse_function(child, source, owner, pending) {
                    facts.callables.push(callable);
                }
                continue;
            }
            "struct_item" | "enum_item" | "union_item" => {
                let pending = std::mem::take(&mut pending);
                if let Some(name) = child.child_by_field_name("name") {
                    facts.types.push(TypeDecl {
                        name: node_text(name, source).to_string(),
                        line: line_of(child),
                        bases: Vec::new(),
                        decorators: pending.attributes,
                        has_docstring: pending.doc,
                        methods: Vec::new(),
                    });
                }
            }
            "trait_item" => {
                let pending = std::mem::take(&mut pending);
                if let Some(decl) = parse_trait(child, source, pending, facts, impls) {
                    facts.types.push(decl);
                }
            }
            "impl_item" => {
                let type_name = child
                    .child_by_field_name("type")
                    .map(|n| base_type_name(node_text(n, source)))
                    .unwrap_or_default();
                let trait_name = child
                    .child_by_field_name("trait")
                    .map(|n| base_type_name(node_text(n, source)));

                if let Some(body) = child.child_by_field_name("body") {
                    collect_items(body, source, Some(&type_name), facts, impls);
                }
                impls.push(ImplBlock {
                    type_name,
                    trait_name,
                });
            }
            "mod_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    collect_items(body, source, None, facts, impls);
                }
            }
            "use_declaration" => {
                if let Some(argument) = child.child_by_field_name("argument") {
                    facts.imports.push(compact(node_text(argument, source)));
                }
            }
            _ => {}
        }
        pending = Pending::default();
    }
}

fn parse_trait(
    node: Node,
    source: &str,
    pending: Pending,
    facts: &mut ModuleFacts,
    impls: &mut Vec<ImplBlock>,
) -> Option<TypeDecl> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();

    let mut bases = Vec::new();
    if let Some(bounds) = node.child_by_field_name("bounds") {
        let mut cursor = bounds.walk();
        for bound in bounds.named_children(&mut cursor) {
            if matches!(
                bound.kind(),
                "type_identifier" | "scoped_type_identifier" | "generic_type"
            ) {
                bases.push(base_type_name(node_text(bound, source)));
            }
        }
    }

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            if matches!(item.kind(), "function_item" | "function_signature_item") {
                if let Some(method) = item.child_by_field_name("name") {
                    methods.push(node_text(method, source).to_string());
                }
            }
        }
        // Provided methods carry bodies worth scanning
        collect_items(body, source, Some(&name), facts, impls);
    }

    Some(TypeDecl {
        name,
        line: line_of(node),
        bases,
        decorators: pending.attributes,
        has_docstring: pending.doc,
        methods,
    })
}

fn parse_function(node: Node, source: &str, owner: Option<&str>, pending: Pending) -> Option<Callable> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();

    let (param_count, annotated_params) = count_parameters(node.child_by_field_name("parameters"));

    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| compact(node_text(n, source)));

    let mut scan = BodyScan::default();
    if let Some(body) = node.child_by_field_name("body") {
        scan.visit(body, source, false);
    }

    Some(Callable {
        name,
        owner: owner.map(str::to_string),
        line: line_of(node),
        is_async: has_async_modifier(node, source),
        decorators: pending.attributes,
        return_type,
        param_count,
        annotated_params,
        has_docstring: pending.doc,
        branch_count: scan.branches,
        has_try: scan.has_try,
        calls: scan.calls,
        handler_calls: scan.handler_calls,
        handler_returns: scan.handler_returns,
    })
}

/// Check for `async` directly or inside `function_modifiers`
fn has_async_modifier(node: Node, source: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "async" => return true,
            "function_modifiers" => {
                if node_text(child, source).split_whitespace().any(|m| m == "async") {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Rust parameters are always typed; the receiver is excluded
fn count_parameters(params: Option<Node>) -> (usize, usize) {
    let Some(params) = params else {
        return (0, 0);
    };

    let mut cursor = params.walk();
    let count = params
        .named_children(&mut cursor)
        .filter(|p| matches!(p.kind(), "parameter" | "variadic_parameter"))
        .count();
    (count, count)
}

/// `#[derive(Debug)]` -> `derive`, `#[tokio::main]` -> `tokio::main`
fn attribute_name(text: &str) -> String {
    let inner = text
        .trim()
        .trim_start_matches("#[")
        .trim_end_matches(']');
    let name = inner
        .split(|c: char| c == '(' || c == '=')
        .next()
        .unwrap_or("");
    compact(name)
}

/// `Foo<T>` -> `Foo`, `crate::agents::Foo` -> `Foo`
fn base_type_name(text: &str) -> String {
    let without_generics = text.split('<').next().unwrap_or(text);
    let last = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);
    compact(last)
}

/// Attach impl methods and implemented traits to the declared types
fn link_impls(facts: &mut ModuleFacts, impls: &[ImplBlock]) {
    for decl in &mut facts.types {
        for callable in &facts.callables {
            if callable.owner.as_deref() == Some(decl.name.as_str())
                && !decl.methods.contains(&callable.name)
            {
                decl.methods.push(callable.name.clone());
            }
        }
        for block in impls {
            if block.type_name != decl.name {
                continue;
            }
            if let Some(trait_name) = &block.trait_name {
                if !decl.bases.contains(trait_name) {
                    decl.bases.push(trait_name.clone());
                }
            }
        }
    }
}

/// Branch points contributing to complexity
fn branch_weight(node: Node) -> u32 {
    match node.kind() {
        "if_expression" | "while_expression" | "for_expression" | "loop_expression" => 1,
        "match_arm" => 1,
        "binary_expression" => {
            let mut cursor = node.walk();
            let logical = node
                .children(&mut cursor)
                .filter(|c| c.kind() == "&&" || c.kind() == "||")
                .count();
            logical as u32
        }
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

/// The last path segment of a call target, e.g. `unwrap_or` for `x.unwrap_or`
fn last_segment(target: &str) -> &str {
    target
        .rsplit(|c: char| c == '.' || c == ':')
        .next()
        .unwrap_or(target)
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
        let mut child_in_handler = in_handler;

        match node.kind() {
            // Nested items are scanned on their own
            "function_item" | "impl_item" | "mod_item" => return,
            "try_expression" => self.has_try = true,
            "return_expression" if in_handler => self.handler_returns = true,
            "call_expression" => {
                if let Some(function) = node.child_by_field_name("function") {
                    let function = match function.kind() {
                        "generic_function" => function.child_by_field_name("function").unwrap_or(function),
                        _ => function,
                    };
                    let target = compact(node_text(function, source));
                    let segment = last_segment(&target);

                    if ERROR_COMBINATORS.contains(&segment) {
                        child_in_handler = true;
                        self.handler_calls.push(target.clone());
                        if FALLBACK_COMBINATORS.contains(&segment) {
                            self.handler_returns = true;
                        }
                    } else if in_handler {
                        if segment == "Ok" || segment == "Some" {
                            self.handler_returns = true;
                        }
                        self.handler_calls.push(target.clone());
                    }
                    self.calls.push(target);
                }
            }
            "macro_invocation" => {
                if let Some(mac) = node.child_by_field_name("macro") {
                    let target = format!("{}!", compact(node_text(mac, source)));
                    if in_handler {
                        self.handler_calls.push(target.clone());
                    }
                    self.calls.push(target);
                }
            }
            "match_arm" => {
                let is_err_arm = node
                    .child_by_field_name("pattern")
                    .is_some_and(|p| node_text(p, source).trim_start().starts_with("Err"));
                child_in_handler = in_handler || is_err_arm;
            }
            _ => {}
        }
        self.branches += branch_weight(node);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, source, child_in_handler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ModuleFacts {
        parse_source(source).expect("source should parse")
    }

    #[test]
    fn test_parse_agent_module() {
        let facts = parse(
            r#"
//! Planner agent.
use std::collections::HashMap;
use tracing::{error, info};

/// Plans tasks.
#[derive(Debug, Default)]
pub struct PlannerAgent {
    cache: HashMap<String, String>,
}

impl PlannerAgent {
    /// Run the plan.
    pub fn execute(&self, task: &str) -> Result<String, PlanError> {
        let plan = self.plan(task)?;
        match self.validate(&plan) {
            Ok(()) => Ok(plan),
            Err(e) => {
                error!("invalid plan: {e}");
                Ok(String::new())
            }
        }
    }

    fn plan(&self, task: &str) -> Result<String, PlanError> {
        info!("planning {task}");
        Ok(task.to_string())
    }
}

impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }
}
"#,
        );

        assert!(facts.has_module_docstring);
        assert_eq!(facts.declared_types(), vec!["PlannerAgent"]);

        let decl = facts.find_type("PlannerAgent").expect("struct");
        assert!(decl.has_docstring);
        assert_eq!(decl.decorators, vec!["derive"]);
        assert_eq!(decl.bases, vec!["Agent"]);
        assert_eq!(decl.methods, vec!["execute", "plan", "name"]);

        let execute = facts
            .find_callable(Some("PlannerAgent"), "execute")
            .expect("execute");
        assert_eq!(execute.return_type.as_deref(), Some("Result<String,PlanError>"));
        assert_eq!(execute.param_count, 1);
        assert_eq!(execute.annotated_params, 1);
        assert!(execute.has_docstring);
        assert!(execute.has_try);
        assert!(execute.handler_returns);
        assert!(execute.handler_calls.contains(&"error!".to_string()));
        assert_eq!(execute.branch_count, 2);

        let plan = facts.find_callable(Some("PlannerAgent"), "plan").expect("plan");
        assert!(!plan.has_docstring);
        assert!(!plan.has_try);
        assert!(plan.calls.contains(&"info!".to_string()));

        assert_eq!(
            facts.imports,
            vec!["std::collections::HashMap".to_string(), "tracing::{error,info}".to_string()]
        );
        assert!(facts.imports_module("tracing"));
    }

    #[test]
    fn test_parse_trait_enum_and_nested_mod() {
        let facts = parse(
            r#"
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn describe(&self) -> String {
        self.name().to_string()
    }
}

pub enum Mode {
    Fast,
    Slow,
}

mod inner {
    pub fn helper() -> u32 {
        1
    }
}
"#,
        );

        assert_eq!(facts.declared_types(), vec!["Agent", "Mode"]);
        let agent = facts.find_type("Agent").expect("trait");
        assert_eq!(agent.methods, vec!["name", "describe"]);
        assert_eq!(agent.bases, vec!["Send", "Sync"]);
        assert!(facts.functions().contains(&"helper"));
        assert!(!facts.has_module_docstring);
    }

    #[test]
    fn test_async_and_fallback_combinators() {
        let facts = parse(
            r#"
pub async fn fetch(url: &str, retries: u32) -> String {
    client::get(url).await.unwrap_or_default()
}
"#,
        );

        let fetch = facts.find_callable(None, "fetch").expect("fetch");
        assert!(fetch.is_async);
        assert_eq!(fetch.param_count, 2);
        assert!(fetch.handler_returns);
        assert!(fetch.calls.contains(&"client::get".to_string()));
    }

    #[test]
    fn test_attribute_name() {
        assert_eq!(attribute_name("#[derive(Debug, Clone)]"), "derive");
        assert_eq!(attribute_name("#[tokio::main]"), "tokio::main");
        assert_eq!(attribute_name("#[doc = \"x\"]"), "doc");
    }

    #[test]
    fn test_base_type_name() {
        assert_eq!(base_type_name("Foo<T>"), "Foo");
        assert_eq!(base_type_name("crate::agents::Foo"), "Foo");
    }

    #[test]
    fn test_malformed_source_fails() {
        let err = parse_source("fn broken( {").expect_err("should fail");
        assert!(matches!(err, ParseError::Syntax { .. }));
    }
}
