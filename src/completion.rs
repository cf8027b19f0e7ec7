//! `prun completions`: shell scripts for the `prun` binary.

use anyhow::{Context, Result, anyhow};
use clap::CommandFactory;
use clap_complete::{Generator, Shell as CompletionShell};
use std::{io::Write, path::PathBuf};

use crate::{
    cli::{AppContext, Cli, CompletionsArgs, Shell},
    infra::io::write_atomic,
};

const BIN_NAME: &str = "prun";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// Completion script for `shell`, in memory.
pub fn script(shell: CompletionShell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, BIN_NAME, &mut buf);
    buf
}

/// Where the script for `shell` lands inside `dir` (`prun.bash`, `_prun`, ...).
pub fn target_path(shell: CompletionShell, dir: &std::path::Path) -> PathBuf {
    dir.join(shell.file_name(BIN_NAME))
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let shell: CompletionShell = args.shell.into();

    if args.stdout {
        std::io::stdout()
            .write_all(&script(shell))
            .context("write completion to stdout")?;
        return Ok(());
    }

    let dir = args
        .out_dir
        .ok_or_else(|| anyhow!("--out-dir is required unless --stdout is set"))?;
    let path = target_path(shell, &dir);

    if ctx.dry_run {
        println!("Would write {shell} completion to {}", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    write_atomic(&path, &script(shell))
        .with_context(|| format!("write completion {}", path.display()))?;

    if !ctx.quiet {
        eprintln!("Wrote completion to {}", path.display());
    }
    Ok(())
}
