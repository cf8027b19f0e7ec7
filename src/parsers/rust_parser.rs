//! Filepath: src/parsers/rust_parser.rs
//! Rust call graph extractor. Tests are `fn test_*` items at file
//! level or inside inline `mod` blocks (the usual `mod tests`).
//! Calls through paths (`a::b()`) and methods are excluded, matching the
//! bare-name policy of the Python adapter. Macro arguments are unparsed
//! token trees, so inside them a call is an identifier immediately
//! followed by a parenthesized token tree (`assert_eq!(add(1, 2), 3)`).

use anyhow::{Context, Result};
use std::path::Path;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::core::callgraph::{CallGraph, CallGraphExtractor, ParseError, is_test_identifier};

pub struct RustCallGraphExtractor {
    language: Language,
    calls: Query,
}

impl RustCallGraphExtractor {
    pub fn new() -> Result<Self> {
        let language = tree_sitter_rust::LANGUAGE.into();

        // scoped_identifier and field_expression callees don't match.
        // Pattern 1 hands every macro token tree to `token_tree_calls`.
        let calls_src = r#"
            (call_expression
              function: (identifier) @callee)
            (token_tree) @tokens
        "#;

        let calls = Query::new(&language, calls_src).context("create Rust call query")?;
        Ok(Self { language, calls })
    }

    /// Visit items of a file or module body, descending into inline modules.
    fn visit_items(&self, container: Node, bytes: &[u8], graph: &mut CallGraph) {
        let mut walker = container.walk();
        let items: Vec<Node> = container.named_children(&mut walker).collect();

        for item in items {
            match item.kind() {
                "function_item" => self.visit_function(item, bytes, graph),
                "mod_item" => {
                    if let Some(body) = item.child_by_field_name("body") {
                        self.visit_items(body, bytes, graph);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_function(&self, func: Node, bytes: &[u8], graph: &mut CallGraph) {
        let Some(name) = func
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(bytes).ok())
        else {
            return;
        };

        if !is_test_identifier(name) {
            return;
        }

        graph.add_test(name);

        let Some(body) = func.child_by_field_name("body") else { return };

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.calls, body, bytes);
        while let Some(m) = matches.next() {
            for cap in m.captures {
                if m.pattern_index == 0 {
                    if let Ok(callee) = cap.node.utf8_text(bytes) {
                        graph.add_call(name, callee);
                    }
                } else {
                    for callee in token_tree_calls(cap.node, bytes) {
                        graph.add_call(name, callee);
                    }
                }
            }
        }
    }
}

/// Bare calls among the direct children of a macro token tree: an
/// identifier, not preceded by `.` or `::`, right before a `( ... )` tree.
/// Nested trees are reported by their own query match.
fn token_tree_calls<'a>(tree: Node, bytes: &'a [u8]) -> Vec<&'a str> {
    let mut walker = tree.walk();
    let children: Vec<Node> = tree.children(&mut walker).collect();

    children
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| {
            pair[0].kind() == "identifier"
                && pair[1].kind() == "token_tree"
                && pair[1].child(0).is_some_and(|open| open.kind() == "(")
        })
        .filter(|(i, _)| {
            // punctuation runs are single tokens, so look at the text
            !i.checked_sub(1)
                .and_then(|prev| children[prev].utf8_text(bytes).ok())
                .is_some_and(|t| t.ends_with('.') || t.ends_with("::"))
        })
        .filter_map(|(_, pair)| pair[0].utf8_text(bytes).ok())
        .collect()
}

impl CallGraphExtractor for RustCallGraphExtractor {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extract(&self, source: &str, file: &Path) -> Result<CallGraph> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse Rust source"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::from_tree(file, source, root).into());
        }

        let mut graph = CallGraph::new();
        self.visit_items(root, source.as_bytes(), &mut graph);
        Ok(graph)
    }
}
