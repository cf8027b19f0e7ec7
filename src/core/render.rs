//! Plain-text and table views of the prioritization inputs and scores.
//! Everything here returns a `String`; callers decide where it goes.

use std::fmt::{self, Display};

use itertools::Itertools;
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};

use crate::{
    cli::AppContext,
    core::{
        callgraph::CallGraph,
        changes::ChangeSet,
        ledger::FailureLedger,
        scoring::{Prioritization, Ranking, Reason},
    },
};

impl Display for Reason
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            Reason::ChangedCallee { name } => write!(f, "calls changed {name}"),
            Reason::ChangedFile { path } => write!(f, "depends on changed {path}"),
            Reason::PastFailures { count } => write!(f, "failed {count}x before"),
        }
    }
}

fn heading(
    text: &str,
    ctx: &AppContext,
) -> String
{
    if ctx.no_color
    {
        text.to_string()
    }
    else
    {
        text.bold()
            .to_string()
    }
}

fn list_or_none<'a>(mut items: impl Iterator<Item = &'a String>) -> String
{
    let joined = items.join(", ");
    if joined.is_empty() { "(none)".to_string() } else { joined }
}

pub fn render_changes(
    changes: &ChangeSet,
    ctx: &AppContext,
) -> String
{
    format!(
        "{} {}\n{} {}\n",
        heading("Changed functions:", ctx),
        list_or_none(
            changes
                .functions
                .iter()
        ),
        heading("Changed files:", ctx),
        list_or_none(
            changes
                .files
                .iter()
        ),
    )
}

pub fn render_ledger(
    ledger: &FailureLedger,
    ctx: &AppContext,
) -> String
{
    let body = if ledger.is_empty()
    {
        "(empty)".to_string()
    }
    else
    {
        ledger
            .counts()
            .iter()
            .map(|(test, n)| format!("{test}={n}"))
            .join(", ")
    };

    format!("{} {}\n", heading("Failure log:", ctx), body)
}

pub fn render_graph(
    graph: &CallGraph,
    ctx: &AppContext,
) -> String
{
    let mut out = format!("{} {} tests\n", heading("Test function map:", ctx), graph.len());
    for (test, callees) in graph.iter()
    {
        out.push_str(&format!("  {test} -> {}\n", list_or_none(callees.iter())));
    }
    out
}

pub fn render_scores(
    ranking: &Ranking,
    ctx: &AppContext,
) -> String
{
    let mut out = format!("{}\n", heading("Scores:", ctx));
    for s in &ranking.scores
    {
        let why = s
            .reasons
            .iter()
            .join("; ");
        if why.is_empty()
        {
            out.push_str(&format!("  {:>4}  {}\n", s.score, s.test));
        }
        else
        {
            out.push_str(&format!("  {:>4}  {}  ({why})\n", s.score, s.test));
        }
    }
    out
}

#[derive(Tabled)]
struct ScoreRow
{
    rank: usize,
    test: String,
    score: u64,
    reasons: String,
}

pub fn render_scores_table(ranking: &Ranking) -> String
{
    let rows = ranking
        .scores
        .iter()
        .enumerate()
        .map(|(i, s)| ScoreRow {
            rank: i + 1,
            test: s
                .test
                .clone(),
            score: s.score,
            reasons: s
                .reasons
                .iter()
                .join("; "),
        });

    Table::new(rows).to_string()
}

pub fn render_selection(
    selection: &Prioritization,
    ctx: &AppContext,
) -> String
{
    let body = match selection
    {
        Prioritization::Ranked(tests) => tests.join(", "),
        Prioritization::Nothing => "(nothing to prioritize)".to_string(),
    };
    format!("{} {}\n", heading("Priority order:", ctx), body)
}

/// Everything a prioritized run computed, printed before acting.
pub fn render_inputs(
    changes: &ChangeSet,
    ledger: &FailureLedger,
    graph: &CallGraph,
    ranking: &Ranking,
    ctx: &AppContext,
) -> String
{
    [
        render_changes(changes, ctx),
        render_ledger(ledger, ctx),
        render_graph(graph, ctx),
        render_scores(ranking, ctx),
        render_selection(&ranking.selection, ctx),
    ]
    .concat()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::scoring::ScoredTest;

    fn plain() -> AppContext
    {
        AppContext { quiet: false, no_color: true, dry_run: false }
    }

    #[test]
    fn changes_and_ledger_text()
    {
        let changes = ChangeSet {
            functions: ["divide".to_string()]
                .into_iter()
                .collect(),
            files: Default::default(),
        };
        assert_eq!(
            render_changes(&changes, &plain()),
            "Changed functions: divide\nChanged files: (none)\n"
        );

        let ledger = FailureLedger::from_counts("l.json", [("test_a", 2), ("test_b", 1)]);
        assert_eq!(render_ledger(&ledger, &plain()), "Failure log: test_a=2, test_b=1\n");
    }

    #[test]
    fn scores_text_lists_reasons()
    {
        let ranking = Ranking {
            scores: vec![
                ScoredTest {
                    test: "test_divide".into(),
                    score: 7,
                    reasons: vec![
                        Reason::ChangedCallee { name: "divide".into() },
                        Reason::PastFailures { count: 1 },
                    ],
                },
                ScoredTest { test: "test_add".into(), score: 0, reasons: vec![] },
            ],
            selection: Prioritization::Ranked(vec!["test_divide".into()]),
        };

        let text = render_scores(&ranking, &plain());
        assert!(text.contains("     7  test_divide  (calls changed divide; failed 1x before)"));
        assert!(text.contains("     0  test_add\n"));

        let table = render_scores_table(&ranking);
        assert!(table.contains("test_divide"));
        assert!(table.contains("rank"));
    }
}
