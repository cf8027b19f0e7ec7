//! Filepath: src/core/callgraph.rs
//! Test → callee mapping shared by every language adapter.
//!
//! A test is a top-level function whose name starts with `test_`. Its
//! entry lists every bare call `name(...)` in the body, in first-seen
//! order. Qualified calls (`obj.name(...)`, `a::b()`) are left out on
//! purpose: without alias analysis the receiver is unknown.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result, bail};
use indexmap::{IndexMap, IndexSet};
use miette::{Diagnostic, NamedSource, SourceSpan};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    infra::io::read_file_smart,
    parsers::{PythonCallGraphExtractor, RustCallGraphExtractor},
};

/// Grammar of a test identifier, unanchored so it can scan free text.
pub const TEST_ID_PATTERN: &str = r"\btest_[A-Za-z0-9_]+\b";

static TEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^test_[A-Za-z0-9_]+$").expect("valid test id regex"));

/// True when `s` is a well-formed test identifier.
pub fn is_test_identifier(s: &str) -> bool
{
    TEST_ID.is_match(s)
}

/// Ordered mapping from test identifier to the bare names it calls.
/// Key order is discovery order and doubles as the ranking tie-breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallGraph
{
    tests: IndexMap<String, IndexSet<String>>,
}

impl CallGraph
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Register a test (idempotent) and return its callee set.
    pub fn add_test(
        &mut self,
        test: impl Into<String>,
    ) -> &mut IndexSet<String>
    {
        self.tests
            .entry(test.into())
            .or_default()
    }

    pub fn add_call(
        &mut self,
        test: &str,
        callee: impl Into<String>,
    )
    {
        self.add_test(test)
            .insert(callee.into());
    }

    pub fn callees(
        &self,
        test: &str,
    ) -> Option<&IndexSet<String>>
    {
        self.tests
            .get(test)
    }

    pub fn contains(
        &self,
        test: &str,
    ) -> bool
    {
        self.tests
            .contains_key(test)
    }

    /// Test identifiers in discovery order.
    pub fn tests(&self) -> impl Iterator<Item = &str>
    {
        self.tests
            .keys()
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)>
    {
        self.tests
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize
    {
        self.tests
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.tests
            .is_empty()
    }

    /// Fold `other` in. Tests already present keep their position and
    /// gain the other file's callees.
    pub fn merge(
        &mut self,
        other: CallGraph,
    )
    {
        for (test, callees) in other.tests
        {
            self.add_test(test)
                .extend(callees);
        }
    }
}

impl<K, V, C> FromIterator<(K, V)> for CallGraph
where
    K: Into<String>,
    V: IntoIterator<Item = C>,
    C: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self
    {
        let mut graph = CallGraph::new();
        for (test, callees) in iter
        {
            let set = graph.add_test(test);
            set.extend(
                callees
                    .into_iter()
                    .map(Into::into),
            );
        }
        graph
    }
}

/// The analysed file is not syntactically valid. Fatal for the invocation.
#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("syntax error in {}:{line}:{column}", .file.display())]
#[diagnostic(
    code(priorun::parse),
    help("fix the syntax error; call graphs are never built from partial trees")
)]
pub struct ParseError
{
    pub file: PathBuf,
    /// 1-based line of the first error node
    pub line: usize,
    /// 1-based column of the first error node
    pub column: usize,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("parser gave up here")]
    pub span: SourceSpan,
}

impl ParseError
{
    /// Locate the first ERROR/MISSING node under `root`.
    pub fn from_tree(
        file: &Path,
        source: &str,
        root: tree_sitter::Node<'_>,
    ) -> Self
    {
        let node = first_error(root).unwrap_or(root);
        let pos = node.start_position();
        let start = node.start_byte();
        let len = node
            .end_byte()
            .saturating_sub(start);

        Self {
            file: file.to_path_buf(),
            line: pos.row + 1,
            column: pos.column + 1,
            src: NamedSource::new(file.display().to_string(), source.to_string()),
            span: SourceSpan::from((start, len)),
        }
    }
}

/// Depth-first search for the earliest error or missing node.
fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>>
{
    if node.is_error() || node.is_missing()
    {
        return Some(node);
    }
    if !node.has_error()
    {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node
        .children(&mut cursor)
        .collect();

    children
        .into_iter()
        .find_map(first_error)
        .or(Some(node))
}

/// One adapter per analysed source language.
pub trait CallGraphExtractor
{
    /// Language label used in logs
    fn language(&self) -> &'static str;

    /// Build the call graph of one file. Syntax errors surface as
    /// [`ParseError`] inside the returned error.
    fn extract(
        &self,
        source: &str,
        file: &Path,
    ) -> Result<CallGraph>;
}

/// Pick an adapter from the file extension.
pub fn get_extractor(path: &Path) -> Result<Option<Box<dyn CallGraphExtractor>>>
{
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let extractor: Box<dyn CallGraphExtractor> = match ext
    {
        "py" | "pyi" => Box::new(PythonCallGraphExtractor::new()?),
        "rs" => Box::new(RustCallGraphExtractor::new()?),
        _ => return Ok(None),
    };

    Ok(Some(extractor))
}

/// Extract and merge the call graphs of `files`, in order.
#[instrument(skip_all, fields(files = files.len()))]
pub fn build_call_graph(files: &[PathBuf]) -> Result<CallGraph>
{
    let mut graph = CallGraph::new();

    for file in files
    {
        let Some(extractor) = get_extractor(file)?
        else
        {
            bail!("unsupported test file (no call graph adapter): {}", file.display());
        };

        let content = read_file_smart(file)?;
        let text = content
            .as_str()
            .with_context(|| format!("read {}", file.display()))?;

        let part = extractor.extract(text, file)?;
        debug!(
            file = %file.display(),
            language = extractor.language(),
            tests = part.len(),
            "extracted call graph"
        );
        graph.merge(part);
    }

    Ok(graph)
}
