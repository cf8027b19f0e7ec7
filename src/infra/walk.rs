//! Filepath: src/infra/walk.rs
//! Gitignore-aware discovery of test files.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs prune directories early and filter files late
//! - Include globs (e.g. `test_*.py`) match on the file name
//! - Deterministic ordering so call graph discovery order is stable
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use tracing::debug;

/// Walker that finds test files under one or more roots.
pub struct TestFileWalker
{
    /// File-name globs a test file must match
    include: GlobSet,

    /// Additional ignore patterns on relative paths
    ignore_patterns: GlobSet,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet>
{
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns
    {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {pattern}"))?);
    }

    Ok(builder.build()?)
}

impl TestFileWalker
{
    /// Build a walker from test-file globs and extra ignore globs.
    pub fn new(
        include: &[String],
        additional_ignores: &[String],
    ) -> Result<Self>
    {
        Ok(Self {
            include: build_globset(include)?,
            ignore_patterns: build_globset(additional_ignores)?,
        })
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // Respect .ignore/.gitignore/.git/info/exclude and global gitignore
        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);

        // Dot-directories (.git, .venv, .tox) never hold tests we want
        b.hidden(true);

        let extra = self
            .ignore_patterns
            .clone();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);

            !(is_dir && extra.is_match(ent.path()))
        });

        b
    }

    /// Does `path` look like a test file by name?
    pub fn is_test_file(
        &self,
        path: &Path,
    ) -> bool
    {
        path.file_name()
            .is_some_and(|name| {
                self.include
                    .is_match(name)
            })
    }

    /// Traverse test files under `root` in sorted order.
    pub fn walk_tests<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .filter(|p| self.is_test_file(p))
            .collect();

        out.sort();

        debug!(root = %root_path.display(), found = out.len(), "walked test files");
        out
    }

    /// Expand a mix of files and directories into a flat, ordered file list.
    /// Explicit files are kept even when their name does not match the globs.
    pub fn expand(
        &self,
        inputs: &[PathBuf],
    ) -> Vec<PathBuf>
    {
        let mut out = Vec::new();

        for input in inputs
        {
            if input.is_dir()
            {
                out.extend(self.walk_tests(input));
            }
            else
            {
                out.push(input.clone());
            }
        }

        out
    }
}
