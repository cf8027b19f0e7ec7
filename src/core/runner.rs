//! Run controller: full runs that feed the ledger, or prioritized runs
//! that hand the executor an `id1 or id2 ...` filter.
//!
//! The executor, the diff source and the oracle are injected, so the
//! whole flow runs in tests without spawning pytest or git.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::{
    cli::AppContext,
    core::{
        advisor::{Advisor, Oracle},
        callgraph::build_call_graph,
        changes::{ChangeDetector, DiffSource},
        ledger::FailureLedger,
        render::render_inputs,
        scoring::ScoringEngine,
    },
    infra::config::{Config, ExecutorConfig, OnEmpty},
};

/// Which path the controller takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode
{
    /// Everything runs, the ledger is updated afterwards
    Full,
    /// Only the ranked selection runs
    Prioritized,
}

impl Mode
{
    /// `prod` selects a full run; anything else, or nothing, a prioritized one.
    pub fn from_env_value(value: Option<&str>) -> Self
    {
        match value
        {
            Some("prod") => Mode::Full,
            _ => Mode::Prioritized,
        }
    }

    /// Read the mode from the environment variable `var`.
    pub fn from_env(var: &str) -> Self
    {
        Self::from_env_value(
            std::env::var(var)
                .ok()
                .as_deref(),
        )
    }
}

/// One request to the external test executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation
{
    /// Whole suite, machine-readable report at `report`
    Full
    {
        report: PathBuf
    },
    /// Tests matching the `-k` style expression
    Filtered
    {
        expr: String
    },
}

/// Exit status of one executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution
{
    pub code: i32,
}

impl Execution
{
    pub fn success(self) -> bool
    {
        self.code == 0
    }
}

pub trait TestExecutor
{
    /// Command line that `execute` would run, for logs and dry runs.
    fn command_line(
        &self,
        invocation: &Invocation,
    ) -> String;

    fn execute(
        &self,
        invocation: &Invocation,
    ) -> Result<Execution>;
}

/// Spawns the configured runner (pytest by default) with inherited stdio.
pub struct CommandExecutor
{
    program: String,
    args: Vec<String>,
}

impl CommandExecutor
{
    pub fn from_config(cfg: &ExecutorConfig) -> Self
    {
        Self {
            program: cfg
                .program
                .clone(),
            args: cfg
                .args
                .clone(),
        }
    }

    fn args_for(
        &self,
        invocation: &Invocation,
    ) -> Vec<String>
    {
        let mut args = self
            .args
            .clone();
        match invocation
        {
            Invocation::Full { report } =>
            {
                args.push("--json-report".to_string());
                args.push(format!("--json-report-file={}", report.display()));
            }
            Invocation::Filtered { expr } =>
            {
                args.push("-k".to_string());
                args.push(expr.clone());
            }
        }
        args
    }
}

impl TestExecutor for CommandExecutor
{
    fn command_line(
        &self,
        invocation: &Invocation,
    ) -> String
    {
        let mut parts = vec![
            self.program
                .clone(),
        ];
        for arg in self.args_for(invocation)
        {
            if arg.contains(' ')
            {
                parts.push(format!("\"{arg}\""));
            }
            else
            {
                parts.push(arg);
            }
        }
        parts.join(" ")
    }

    fn execute(
        &self,
        invocation: &Invocation,
    ) -> Result<Execution>
    {
        let status = Command::new(&self.program)
            .args(self.args_for(invocation))
            .status()
            .with_context(|| format!("Failed to spawn test executor `{}`", self.program))?;

        // Killed by a signal: no code, count as failure
        Ok(Execution { code: status.code().unwrap_or(1) })
    }
}

/// Where the executed selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource
{
    Heuristic,
    Advisor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome
{
    Full
    {
        execution: Execution,
        /// Failures added to the ledger
        recorded: u64,
    },
    Prioritized
    {
        selected: Vec<String>,
        source: SelectionSource,
        execution: Execution,
    },
    /// Selection was empty and the policy is to skip
    NothingToRun,
    /// `--dry-run`: the command that would have run
    DryRun
    {
        command: String
    },
}

impl RunOutcome
{
    /// Process exit code: the executor's, or 0 when nothing ran.
    pub fn exit_code(&self) -> i32
    {
        match self
        {
            RunOutcome::Full { execution, .. } | RunOutcome::Prioritized { execution, .. } =>
            {
                execution.code
            }
            RunOutcome::NothingToRun | RunOutcome::DryRun { .. } => 0,
        }
    }
}

pub struct RunController<'a>
{
    pub config: &'a Config,
    /// Test files to analyse, already expanded
    pub test_files: &'a [PathBuf],
    pub diff: &'a dyn DiffSource,
    pub executor: &'a dyn TestExecutor,
    pub oracle: Option<&'a dyn Oracle>,
    pub ctx: &'a AppContext,
}

impl RunController<'_>
{
    fn say(
        &self,
        text: &str,
    )
    {
        if !self
            .ctx
            .quiet
        {
            println!("{text}");
        }
    }

    pub fn run(
        &self,
        mode: Mode,
    ) -> Result<RunOutcome>
    {
        match mode
        {
            Mode::Full => self.run_full(),
            Mode::Prioritized => self.run_prioritized(),
        }
    }

    /// Run everything, then fold the report into the ledger.
    #[instrument(skip_all)]
    pub fn run_full(&self) -> Result<RunOutcome>
    {
        let report = self
            .config
            .report_path
            .clone();
        let invocation = Invocation::Full { report: report.clone() };

        self.say("Running all tests (full mode)...");
        let command = self
            .executor
            .command_line(&invocation);

        if self
            .ctx
            .dry_run
        {
            self.say(&format!("Would execute: {command}"));
            return Ok(RunOutcome::DryRun { command });
        }

        // A stale report would be counted twice if the executor fails to write one
        remove_stale(&report)?;

        info!(%command, "executing full suite");
        let execution = self
            .executor
            .execute(&invocation)?;

        let mut ledger = FailureLedger::load(&self.config.ledger_path)?;
        let recorded = ledger.update(&report)?;
        self.say(&format!(
            "Recorded {recorded} failure(s) in {}",
            ledger
                .path()
                .display()
        ));

        Ok(RunOutcome::Full { execution, recorded })
    }

    /// Rank, optionally re-rank, and run the selection.
    #[instrument(skip_all)]
    pub fn run_prioritized(&self) -> Result<RunOutcome>
    {
        self.say("Running prioritized tests...");

        let ledger = FailureLedger::load(&self.config.ledger_path)?;
        let changes = ChangeDetector::from_config(&self.config.diff).detect(self.diff);
        let graph = build_call_graph(self.test_files)?;

        let ranking = ScoringEngine::from_config(&self.config.scoring).rank(&graph, &changes, &ledger);

        if !self
            .ctx
            .quiet
        {
            print!("{}", render_inputs(&changes, &ledger, &graph, &ranking, self.ctx));
        }

        let heuristic = ranking
            .selection
            .into_tests();

        let (selected, source) = match self.oracle
        {
            Some(oracle) => match Advisor::new(oracle).rerank(&graph, &changes, &ledger)
            {
                Ok(picked) => (picked, SelectionSource::Advisor),
                Err(e) =>
                {
                    warn!(error = %e, "advisor unavailable, using heuristic ranking");
                    (heuristic, SelectionSource::Heuristic)
                }
            },
            None => (heuristic, SelectionSource::Heuristic),
        };

        if selected.is_empty()
        {
            return match self
                .config
                .scoring
                .on_empty
            {
                OnEmpty::Skip =>
                {
                    self.say("No prioritized tests to run.");
                    Ok(RunOutcome::NothingToRun)
                }
                OnEmpty::Full =>
                {
                    self.say("Nothing to prioritize, falling back to a full run.");
                    self.run_full()
                }
            };
        }

        let invocation = Invocation::Filtered { expr: selected.join(" or ") };
        let command = self
            .executor
            .command_line(&invocation);
        self.say(&format!("Executing: {command}"));

        if self
            .ctx
            .dry_run
        {
            return Ok(RunOutcome::DryRun { command });
        }

        let execution = self
            .executor
            .execute(&invocation)?;
        Ok(RunOutcome::Prioritized { selected, source, execution })
    }
}

fn remove_stale(report: &Path) -> Result<()>
{
    match std::fs::remove_file(report)
    {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove stale report {}", report.display())),
    }
}
