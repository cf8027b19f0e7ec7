//! Change detection from unified diffs.
//!
//! The diff comes from a [`DiffSource`] (git in production, a saved file
//! or a string in tests). Hunk-level scanning looks a few lines past each
//! file and hunk header for definition lines and keeps their names; the
//! file-level strategy just records every changed source file.

use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::LazyLock,
};

use anyhow::{Context, Result, bail};
use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::infra::config::{ChangeStrategy, DiffConfig};

/// `def name(`, `async def name(`, `pub fn name(` / `fn name<T>(`.
static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:def|fn)\s+([A-Za-z_][A-Za-z0-9_]*)\s*[(<]",
    )
    .expect("valid definition regex")
});

/// What changed relative to the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet
{
    /// Functions defined near added/removed lines
    pub functions: IndexSet<String>,
    /// Changed source files (file-level strategy)
    pub files: IndexSet<String>,
}

impl ChangeSet
{
    pub fn is_empty(&self) -> bool
    {
        self.functions
            .is_empty()
            && self
                .files
                .is_empty()
    }

    /// True when `related` names a changed file, either exactly or as the
    /// trailing component(s) of a repo-relative path.
    pub fn touches_file(
        &self,
        related: &str,
    ) -> bool
    {
        self.files
            .iter()
            .any(|f| {
                f == related
                    || f.strip_suffix(related)
                        .is_some_and(|head| head.ends_with('/'))
            })
    }
}

/// Anything that can produce unified-diff text.
pub trait DiffSource
{
    fn diff(&self) -> Result<String>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// `git diff <base>` in a repository root: working tree vs. baseline.
pub struct GitDiffSource
{
    pub repo_root: PathBuf,
    pub base: String,
}

impl GitDiffSource
{
    pub fn new(
        repo_root: impl Into<PathBuf>,
        base: impl Into<String>,
    ) -> Self
    {
        Self { repo_root: repo_root.into(), base: base.into() }
    }
}

impl DiffSource for GitDiffSource
{
    fn diff(&self) -> Result<String>
    {
        let output = Command::new("git")
            .arg("diff")
            .arg("--no-color")
            .arg(&self.base)
            .current_dir(&self.repo_root)
            .output()
            .context("Failed to run git diff")?;

        if !output
            .status
            .success()
        {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git diff {} failed: {}", self.base, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn describe(&self) -> String
    {
        format!("git diff {}", self.base)
    }
}

/// A diff saved to disk (`git diff > change.diff`).
pub struct FileDiffSource
{
    pub path: PathBuf,
}

impl DiffSource for FileDiffSource
{
    fn diff(&self) -> Result<String>
    {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("read diff file {}", self.path.display()))
    }

    fn describe(&self) -> String
    {
        self.path
            .display()
            .to_string()
    }
}

/// Diff text held in memory.
pub struct StaticDiff(pub String);

impl DiffSource for StaticDiff
{
    fn diff(&self) -> Result<String>
    {
        Ok(self
            .0
            .clone())
    }

    fn describe(&self) -> String
    {
        "inline diff".to_string()
    }
}

/// Turns diff text into a [`ChangeSet`].
#[derive(Debug, Clone)]
pub struct ChangeDetector
{
    strategy: ChangeStrategy,
    window: usize,
    extensions: Vec<String>,
}

impl ChangeDetector
{
    pub fn new(
        strategy: ChangeStrategy,
        window: usize,
        extensions: Vec<String>,
    ) -> Self
    {
        Self { strategy, window, extensions }
    }

    pub fn from_config(cfg: &DiffConfig) -> Self
    {
        Self::new(cfg.strategy, cfg.window, cfg.extensions.clone())
    }

    /// Fetch the diff and parse it. A failing or silent source yields an
    /// empty change set; the run carries on.
    #[instrument(skip_all, fields(source = %source.describe()))]
    pub fn detect(
        &self,
        source: &dyn DiffSource,
    ) -> ChangeSet
    {
        match source.diff()
        {
            Ok(text) if text.trim().is_empty() =>
            {
                info!("diff is empty, no changes detected");
                ChangeSet::default()
            }
            Ok(text) => self.parse(&text),
            Err(e) =>
            {
                warn!(error = %e, "diff source failed, continuing with no changes");
                ChangeSet::default()
            }
        }
    }

    fn is_source(
        &self,
        path: &str,
    ) -> bool
    {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|x| x == ext)
            })
    }

    /// Parse unified-diff text. No file headers means no changes.
    pub fn parse(
        &self,
        diff: &str,
    ) -> ChangeSet
    {
        let mut out = ChangeSet::default();

        // Inside a scanned source file section
        let mut scanning = false;
        // Lines left in the current lookahead window
        let mut remaining = 0usize;
        // `+++` only counts as a header right after `---`
        let mut prev_minus_header = false;
        // Body lines still owed by the current hunk
        let mut hunk = HunkBudget::default();

        for line in diff.lines()
        {
            if hunk.is_open() && hunk.consume(line)
            {
                if scanning && self.strategy == ChangeStrategy::Function && remaining > 0
                {
                    remaining -= 1;
                    if let Some(name) = definition_name(strip_marker(line))
                    {
                        out.functions
                            .insert(name.to_string());
                    }
                }
                continue;
            }
            hunk = HunkBudget::default();

            if prev_minus_header && let Some(raw) = line.strip_prefix("+++ ")
            {
                prev_minus_header = false;
                match header_path(raw).filter(|p| self.is_source(p))
                {
                    Some(path) =>
                    {
                        debug!(file = %path, "scanning diff section");
                        scanning = true;
                        remaining = self.window;
                        if self.strategy == ChangeStrategy::File
                        {
                            out.files
                                .insert(path);
                        }
                    }
                    None =>
                    {
                        scanning = false;
                        remaining = 0;
                    }
                }
                continue;
            }
            prev_minus_header = line.starts_with("--- ");

            if line.starts_with("diff --git ")
            {
                scanning = false;
                remaining = 0;
                continue;
            }

            if let Some(budget) = HunkBudget::from_header(line)
            {
                hunk = budget;
            }

            if !scanning || self.strategy == ChangeStrategy::File
            {
                continue;
            }

            if let Some(heading) = hunk_heading(line)
            {
                remaining = self.window;
                if let Some(name) = definition_name(heading)
                {
                    out.functions
                        .insert(name.to_string());
                }
                continue;
            }

            if remaining == 0
            {
                continue;
            }
            remaining -= 1;

            if let Some(name) = definition_name(strip_marker(line))
            {
                out.functions
                    .insert(name.to_string());
            }
        }

        out
    }
}

/// Old/new line counts announced by `@@ -a,b +c,d @@`, drawn down as the
/// hunk body is read. File headers are only recognised once both are spent.
#[derive(Debug, Default, Clone, Copy)]
struct HunkBudget
{
    old: usize,
    new: usize,
}

impl HunkBudget
{
    fn from_header(line: &str) -> Option<Self>
    {
        let rest = line.strip_prefix("@@ ")?;
        let ranges = &rest[..rest.find(" @@")?];
        let mut parts = ranges.split_whitespace();

        let old = range_len(
            parts
                .next()?
                .strip_prefix('-')?,
        )?;
        let new = range_len(
            parts
                .next()?
                .strip_prefix('+')?,
        )?;

        Some(Self { old, new })
    }

    fn is_open(&self) -> bool
    {
        self.old > 0 || self.new > 0
    }

    /// Account for one line. `false` when the line cannot be hunk body.
    fn consume(
        &mut self,
        line: &str,
    ) -> bool
    {
        match line
            .as_bytes()
            .first()
        {
            // blank context lines lose their leading space in some tools
            None | Some(b' ') =>
            {
                self.old = self
                    .old
                    .saturating_sub(1);
                self.new = self
                    .new
                    .saturating_sub(1);
            }
            Some(b'-') =>
            {
                self.old = self
                    .old
                    .saturating_sub(1)
            }
            Some(b'+') =>
            {
                self.new = self
                    .new
                    .saturating_sub(1)
            }
            // `\ No newline at end of file`
            Some(b'\\') =>
            {}
            Some(_) => return false,
        }
        true
    }
}

/// Line count of a `start[,count]` range; a bare start means one line.
fn range_len(range: &str) -> Option<usize>
{
    match range.split_once(',')
    {
        Some((_, count)) => count
            .parse()
            .ok(),
        None => Some(1),
    }
}

/// Name captured from a definition line, if it is one.
pub fn definition_name(line: &str) -> Option<&str>
{
    DEFINITION
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Path from a `+++` header, `None` for deletions.
fn header_path(raw: &str) -> Option<String>
{
    let path = raw
        .split('\t')
        .next()
        .unwrap_or(raw)
        .trim()
        .trim_matches('"');

    if path == "/dev/null"
    {
        return None;
    }

    Some(
        path.strip_prefix("b/")
            .unwrap_or(path)
            .to_string(),
    )
}

/// Text after the closing `@@` of a hunk header (may be empty).
fn hunk_heading(line: &str) -> Option<&str>
{
    let rest = line.strip_prefix("@@ ")?;
    let end = rest.find(" @@")?;
    Some(rest[end + 3..].trim_start())
}

/// Drop the one-character diff marker of a hunk line.
fn strip_marker(line: &str) -> &str
{
    match line
        .as_bytes()
        .first()
    {
        Some(b'+' | b'-' | b' ') => &line[1..],
        _ => line,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn detector(strategy: ChangeStrategy) -> ChangeDetector
    {
        ChangeDetector::new(strategy, 5, vec!["py".to_string(), "rs".to_string()])
    }

    const SOURCE_DIFF: &str = "\
diff --git a/src/source_code.py b/src/source_code.py
index 1111111..2222222 100644
--- a/src/source_code.py
+++ b/src/source_code.py
@@ -8,6 +8,8 @@ def subtract(a, b):

 def divide(a, b):
+    if b == 0:
+        raise ValueError(\"division by zero\")
     return a / b
";

    #[test]
    fn function_strategy_finds_heading_and_window_defs()
    {
        let cs = detector(ChangeStrategy::Function).parse(SOURCE_DIFF);
        let names: Vec<_> = cs
            .functions
            .iter()
            .cloned()
            .collect();
        assert_eq!(names, vec!["subtract", "divide"]);
        assert!(
            cs.files
                .is_empty()
        );
    }

    #[test]
    fn file_strategy_records_paths_only()
    {
        let cs = detector(ChangeStrategy::File).parse(SOURCE_DIFF);
        assert!(
            cs.functions
                .is_empty()
        );
        assert!(cs.touches_file("source_code.py"));
        assert!(cs.touches_file("src/source_code.py"));
        assert!(!cs.touches_file("code.py"));
    }

    #[test]
    fn window_is_bounded()
    {
        let diff = "\
--- a/m.py
+++ b/m.py
@@ -1,9 +1,9 @@
 import os
 x = 1
 y = 2
 z = 3
 w = 4
 v = 5
-def far_away():
+def far_away2():
";
        let cs = detector(ChangeStrategy::Function).parse(diff);
        assert!(cs.is_empty());
    }

    #[test]
    fn no_headers_means_no_changes()
    {
        let d = detector(ChangeStrategy::Function);
        assert!(
            d.parse("")
                .is_empty()
        );
        assert!(
            d.parse("+def orphan():\n+    pass\n")
                .is_empty()
        );
    }

    #[test]
    fn non_source_sections_are_skipped()
    {
        let diff = "\
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-def not_code(x):
+def still_not_code(x):
--- a/pkg/util.rs
+++ b/pkg/util.rs
@@ -3,3 +3,4 @@
+pub fn clamp<T: Ord>(v: T) -> T {
";
        let cs = detector(ChangeStrategy::Function).parse(diff);
        assert_eq!(
            cs.functions
                .iter()
                .collect::<Vec<_>>(),
            vec!["clamp"]
        );
    }

    #[test]
    fn deleted_files_are_ignored()
    {
        let diff = "--- a/old.py\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-def gone():\n-    pass\n";
        let cs = detector(ChangeStrategy::File).parse(diff);
        assert!(cs.is_empty());
    }

    #[test]
    fn header_like_content_inside_hunk_is_not_a_header()
    {
        let diff = "\
--- a/m.py
+++ b/m.py
@@ -1,3 +1,3 @@
+++ counter
 def kept(a):
";
        let cs = detector(ChangeStrategy::Function).parse(diff);
        assert_eq!(
            cs.functions
                .iter()
                .collect::<Vec<_>>(),
            vec!["kept"]
        );
    }

    #[test]
    fn removed_and_added_dash_lines_stay_in_their_hunk()
    {
        // `-- x` removed and `++ y` added inside one hunk
        let diff = "\
--- a/m.py
+++ b/m.py
@@ -1,3 +1,3 @@
--- x
+++ y
 def kept(a):
     pass
--- a/n.py
+++ b/n.py
@@ -1 +1,2 @@
 def other(b):
+    return b
";
        let cs = detector(ChangeStrategy::Function).parse(diff);
        assert_eq!(
            cs.functions
                .iter()
                .collect::<Vec<_>>(),
            vec!["kept", "other"]
        );

        let files = detector(ChangeStrategy::File).parse(diff);
        assert_eq!(
            files
                .files
                .iter()
                .collect::<Vec<_>>(),
            vec!["m.py", "n.py"]
        );
    }

    #[test]
    fn hunk_counts_default_to_one_line()
    {
        assert_eq!(
            HunkBudget::from_header("@@ -3 +3,4 @@ def f(x):").map(|b| (b.old, b.new)),
            Some((1, 4))
        );
        assert!(HunkBudget::from_header("@@ garbage @@").is_none());
    }

    struct FailingSource;

    impl DiffSource for FailingSource
    {
        fn diff(&self) -> Result<String>
        {
            bail!("fatal: bad revision 'origin/main'")
        }

        fn describe(&self) -> String
        {
            "failing".to_string()
        }
    }

    #[test]
    fn failing_source_degrades_to_empty()
    {
        let d = detector(ChangeStrategy::Function);
        assert!(
            d.detect(&FailingSource)
                .is_empty()
        );
        assert!(
            d.detect(&StaticDiff(String::new()))
                .is_empty()
        );
        assert!(
            !d.detect(&StaticDiff(SOURCE_DIFF.to_string()))
                .is_empty()
        );
    }

    #[test]
    fn definition_pattern()
    {
        assert_eq!(definition_name("    def method(self):"), Some("method"));
        assert_eq!(definition_name("async def fetch():"), Some("fetch"));
        assert_eq!(definition_name("pub(crate) fn go<T>(t: T)"), Some("go"));
        assert_eq!(definition_name("result = define(x)"), None);
        assert_eq!(definition_name("# def commented(x)"), None);
    }
}
