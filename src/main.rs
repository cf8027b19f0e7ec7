use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use priorun::{
    cli::{AppContext, Cli, Commands},
    core::ParseError,
};
use tracing_subscriber::EnvFilter;

/// Exit code for errors raised by prun itself, as opposed to the executor.
const TOOL_ERROR: u8 = 2;

fn init_tracing() {
    // PRIORUN_LOG=debug, PRIORUN_LOG=priorun::core::changes=trace, ...
    let filter = EnvFilter::try_from_env("PRIORUN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(command: Commands, ctx: &AppContext) -> Result<i32> {
    match command {
        Commands::Run(args) => priorun::cli_ext::run_cmd::run(args, ctx),
        Commands::Graph(args) => priorun::cli_ext::inspect_cmd::graph(args, ctx).map(|_| 0),
        Commands::Changed(args) => priorun::cli_ext::inspect_cmd::changed(args, ctx).map(|_| 0),
        Commands::Score(args) => priorun::cli_ext::inspect_cmd::score(args, ctx).map(|_| 0),
        Commands::Ledger(args) => priorun::cli_ext::ledger_cmd::run(args, ctx).map(|_| 0),
        Commands::Init(args) => priorun::infra::config::init(args, ctx).map(|_| 0),
        Commands::Completions(args) => priorun::completion::run(args, ctx).map(|_| 0),
    }
}

fn report(err: anyhow::Error, ctx: &AppContext) {
    match err.downcast::<ParseError>() {
        Ok(parse) => {
            let color = !ctx.no_color;
            let _ = miette::set_hook(Box::new(move |_| {
                Box::new(miette::MietteHandlerOpts::new().color(color).build())
            }));
            eprintln!("{:?}", miette::Report::new(parse));
        }
        Err(err) => eprintln!("Error: {err:#}"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env in the working directory (or a parent); real env vars win
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Err(e) = dotenv
        && !e.not_found()
    {
        tracing::warn!(error = %e, "ignoring unreadable .env file");
    }

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match dispatch(cli.command, &ctx) {
        // Executor codes outside 0..=255 are clamped to a generic failure
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            report(err, &ctx);
            ExitCode::from(TOOL_ERROR)
        }
    }
}
