//! Resolution of command inputs shared by every handler: which test files
//! to analyse and where the diff comes from.

use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::{
    cli::DiffArgs,
    core::changes::{DiffSource, FileDiffSource, GitDiffSource},
    infra::{config::Config, walk::TestFileWalker},
};

/// Expand command-line paths, or the configured `tests` when none are
/// given, into an ordered list of test files.
pub fn test_files(
    config: &Config,
    overrides: &[PathBuf],
) -> Result<Vec<PathBuf>>
{
    let inputs = if overrides.is_empty()
    {
        config
            .tests
            .as_slice()
    }
    else
    {
        overrides
    };

    let walker = TestFileWalker::new(&config.test_globs, &config.ignore_patterns)?;
    let files = walker.expand(inputs);

    if files.is_empty()
    {
        warn!(?inputs, "no test files found");
    }
    Ok(files)
}

/// A saved diff when `--diff-file` is given, otherwise `git diff <base>`
/// in the current directory.
pub fn diff_source(
    config: &Config,
    args: &DiffArgs,
) -> Box<dyn DiffSource>
{
    match &args.diff_file
    {
        Some(path) => Box::new(FileDiffSource { path: path.clone() }),
        None =>
        {
            let base = args
                .base
                .clone()
                .unwrap_or_else(|| {
                    config
                        .diff
                        .base
                        .clone()
                });
            Box::new(GitDiffSource::new(".", base))
        }
    }
}
