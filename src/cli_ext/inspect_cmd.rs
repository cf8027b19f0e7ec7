//! Read-only views: `graph`, `changed` and `score`.
//!
//! Each one computes a single stage of the prioritization pipeline and
//! prints it as text, JSON or a table. Nothing is executed and the
//! ledger is never written.

use anyhow::Result;
use itertools::Itertools;
use serde_json::json;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::{
    cli::{AppContext, ChangedArgs, GraphArgs, OutputFormat, ScoreArgs},
    cli_ext::inputs::{diff_source, test_files},
    core::{
        callgraph::build_call_graph,
        changes::ChangeDetector,
        ledger::FailureLedger,
        render::{render_changes, render_graph, render_scores, render_scores_table, render_selection},
        scoring::ScoringEngine,
    },
    infra::config::load_config,
};

#[derive(Tabled)]
struct GraphRow
{
    test: String,
    calls: String,
}

#[derive(Tabled)]
struct ChangeRow
{
    kind: &'static str,
    name: String,
}

#[instrument(skip_all)]
pub fn graph(
    args: GraphArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let files = test_files(&config, &args.paths)?;
    let graph = build_call_graph(&files)?;

    match args.format
    {
        OutputFormat::Text => print!("{}", render_graph(&graph, ctx)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        OutputFormat::Table =>
        {
            let rows = graph
                .iter()
                .map(|(test, callees)| GraphRow {
                    test: test.to_string(),
                    calls: callees
                        .iter()
                        .join(", "),
                });
            println!("{}", Table::new(rows));
        }
    }
    Ok(())
}

#[instrument(skip_all)]
pub fn changed(
    args: ChangedArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let source = diff_source(&config, &args.diff);
    let changes = ChangeDetector::from_config(&config.diff).detect(source.as_ref());

    match args.format
    {
        OutputFormat::Text => print!("{}", render_changes(&changes, ctx)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
        OutputFormat::Table =>
        {
            let functions = changes
                .functions
                .iter()
                .map(|f| ChangeRow { kind: "function", name: f.clone() });
            let files = changes
                .files
                .iter()
                .map(|f| ChangeRow { kind: "file", name: f.clone() });
            println!("{}", Table::new(functions.chain(files)));
        }
    }
    Ok(())
}

#[instrument(skip_all)]
pub fn score(
    args: ScoreArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let ledger = FailureLedger::load(&config.ledger_path)?;
    let source = diff_source(&config, &args.diff);
    let changes = ChangeDetector::from_config(&config.diff).detect(source.as_ref());
    let files = test_files(&config, &args.paths)?;
    let graph = build_call_graph(&files)?;

    let ranking = ScoringEngine::from_config(&config.scoring).rank(&graph, &changes, &ledger);

    match args.format
    {
        OutputFormat::Text =>
        {
            print!("{}", render_scores(&ranking, ctx));
            print!("{}", render_selection(&ranking.selection, ctx));
        }
        OutputFormat::Json =>
        {
            let out = json!({
                "scores": ranking.scores,
                "selection": ranking.selection.clone().into_tests(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => println!("{}", render_scores_table(&ranking)),
    }
    Ok(())
}
