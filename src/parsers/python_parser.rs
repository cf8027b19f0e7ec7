//! Filepath: src/parsers/python_parser.rs
//! ------------------------------------------------------------------
//! Python call graph extractor built on Tree-sitter 0.25.x.
//!
//! Notes:
//!   - Tests are module-level `def test_*` (plain, async, or
//!     decorated). Methods of test classes are not collected.
//!   - The callee query runs on the function body only, so
//!     decorator arguments never leak into the graph.
//!   - Nested blocks, comprehensions, lambdas and inner defs are
//!     part of the body and are walked like any other scope.
//!   - Only `name(...)` counts; `obj.name(...)` is an attribute
//!     call and is skipped.
//! ------------------------------------------------------------------

use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::core::callgraph::{CallGraph, CallGraphExtractor, ParseError, is_test_identifier};

/// Extracts `test_*` → bare callee sets from Python sources.
pub struct PythonCallGraphExtractor {
    /// Python language handle for Tree-sitter.
    language: Language,
    /// Captures the callee identifier of every bare call.
    calls: Query,
}

impl PythonCallGraphExtractor {
    pub fn new() -> Result<Self> {
        let language = tree_sitter_python::LANGUAGE.into();

        // `function:` is stable across grammar releases; an attribute
        // callee has kind `attribute` and does not match.
        let query_src = r#"
            (call
              function: (identifier) @callee)
        "#;

        let calls = Query::new(&language, query_src).context("create Python call query")?;

        Ok(Self { language, calls })
    }

    /// Collect callee names under `body`, in source order.
    fn collect_calls(&self, body: Node, bytes: &[u8], graph: &mut CallGraph, test: &str) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.calls, body, bytes);

        while let Some(m) = matches.next() {
            for cap in m.captures {
                if let Ok(name) = cap.node.utf8_text(bytes) {
                    graph.add_call(test, name);
                }
            }
        }
    }
}

impl CallGraphExtractor for PythonCallGraphExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extract(&self, source: &str, file: &Path) -> Result<CallGraph> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .context("set Python language")?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("Tree-sitter produced no tree for {}", file.display()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::from_tree(file, source, root).into());
        }

        let bytes = source.as_bytes();
        let mut graph = CallGraph::new();
        let mut walker = root.walk();

        for item in root.named_children(&mut walker) {
            let Some(def) = as_function(item) else { continue };

            let Some(name) = def
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(bytes).ok())
            else {
                continue;
            };

            if !is_test_identifier(name) {
                continue;
            }

            // Register first so call-free tests still appear.
            graph.add_test(name);

            if let Some(body) = def.child_by_field_name("body") {
                self.collect_calls(body, bytes, &mut graph, name);
            }
        }

        Ok(graph)
    }
}

/// Unwrap `@decorator` wrappers down to the function definition.
fn as_function(node: Node) -> Option<Node> {
    match node.kind() {
        "function_definition" => Some(node),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .filter(|d| d.kind() == "function_definition"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn extract(src: &str) -> Result<CallGraph> {
        PythonCallGraphExtractor::new()?.extract(src, &PathBuf::from("test_cases.py"))
    }

    fn callees(g: &CallGraph, test: &str) -> Vec<String> {
        g.callees(test)
            .expect("test missing from graph")
            .iter()
            .cloned()
            .collect()
    }

    #[test]
    fn python_calculator_suite() -> Result<()> {
        let src = r#"
import pytest
from source_code import add, subtract, divide

def test_add():
    assert add(1, 2) == 3

def test_subtract():
    assert subtract(5, 2) == 3

def test_divide():
    assert divide(10, 2) == 5

def test_divide_by_zero():
    with pytest.raises(ValueError):
        divide(5, 0)
"#;
        let g = extract(src)?;

        assert_eq!(
            g.tests().collect::<Vec<_>>(),
            vec!["test_add", "test_subtract", "test_divide", "test_divide_by_zero"]
        );
        assert_eq!(callees(&g, "test_add"), vec!["add"]);
        // pytest.raises is qualified, only divide is bare
        assert_eq!(callees(&g, "test_divide_by_zero"), vec!["divide"]);
        Ok(())
    }

    #[test]
    fn python_non_tests_are_ignored_and_empty_tests_kept() -> Result<()> {
        let src = r#"
def helper():
    return compute()

def test_nothing():
    assert True

class TestGroup:
    def test_method(self):
        run()
"#;
        let g = extract(src)?;
        assert_eq!(g.tests().collect::<Vec<_>>(), vec!["test_nothing"]);
        assert!(callees(&g, "test_nothing").is_empty());
        Ok(())
    }

    #[test]
    fn python_malformed_test_names_are_skipped() -> Result<()> {
        // `-k test_` would select every test in the suite
        let src = r#"
def test_():
    add(1, 2)

def test_é():
    add(1, 2)

def test_ok2():
    add(1, 2)
"#;
        let g = extract(src)?;
        assert_eq!(g.tests().collect::<Vec<_>>(), vec!["test_ok2"]);
        Ok(())
    }

    #[test]
    fn python_nested_scopes_and_dedupe() -> Result<()> {
        let src = r#"
def test_nested():
    for i in range(3):
        if check(i):
            check(i)
    def inner():
        return build(len([1]))
    values = [convert(x) for x in items()]
    obj.method(skip())
"#;
        let g = extract(src)?;
        assert_eq!(
            callees(&g, "test_nested"),
            vec!["range", "check", "build", "len", "convert", "items", "skip"]
        );
        Ok(())
    }

    #[test]
    fn python_decorated_and_async_tests() -> Result<()> {
        let src = r#"
@pytest.mark.parametrize("x", make_cases())
def test_param(x):
    assert square(x) >= 0

async def test_async():
    await fetch()
"#;
        let g = extract(src)?;
        // decorator argument calls are outside the body
        assert_eq!(callees(&g, "test_param"), vec!["square"]);
        assert_eq!(callees(&g, "test_async"), vec!["fetch"]);
        Ok(())
    }

    #[test]
    fn python_syntax_error_is_parse_error() -> Result<()> {
        let src = "def test_ok():\n    pass\n\ndef test_broken(:\n    pass\n";
        let err = extract(src).unwrap_err();
        let parse = err
            .downcast_ref::<ParseError>()
            .expect("ParseError expected");
        assert_eq!(parse.file, PathBuf::from("test_cases.py"));
        assert_eq!(parse.line, 4);
        Ok(())
    }
}
