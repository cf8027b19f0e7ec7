//! `prun run`: wires config, diff source, executor and advisor into the
//! run controller.

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    cli::{AppContext, ModeArg, RunArgs},
    cli_ext::inputs::{diff_source, test_files},
    core::{
        advisor::{HttpOracle, Oracle},
        runner::{CommandExecutor, Mode, RunController},
    },
    infra::config::load_config,
};

impl From<ModeArg> for Mode
{
    fn from(arg: ModeArg) -> Self
    {
        match arg
        {
            ModeArg::Full => Mode::Full,
            ModeArg::Prioritized => Mode::Prioritized,
        }
    }
}

/// Run and return the exit code the process should end with.
pub fn run(
    args: RunArgs,
    ctx: &AppContext,
) -> Result<i32>
{
    let config = load_config()?;

    let mode = args
        .mode
        .map(Mode::from)
        .unwrap_or_else(|| Mode::from_env(&config.mode_env));
    info!(?mode, "run mode");

    let files = test_files(&config, &args.tests)?;
    let diff = diff_source(&config, &args.diff);
    let executor = CommandExecutor::from_config(&config.executor);

    // Advisor problems never stop a run; the heuristic ranking stands in
    let oracle = if args.advisor || config.advisor.enabled
    {
        match HttpOracle::from_config(&config.advisor)
        {
            Ok(oracle) => Some(oracle),
            Err(e) =>
            {
                warn!(error = %e, "advisor disabled");
                None
            }
        }
    }
    else
    {
        None
    };

    let controller = RunController {
        config: &config,
        test_files: &files,
        diff: diff.as_ref(),
        executor: &executor,
        oracle: oracle
            .as_ref()
            .map(|o| o as &dyn Oracle),
        ctx,
    };

    let outcome = controller.run(mode)?;
    Ok(outcome.exit_code())
}
