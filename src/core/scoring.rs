//! Heuristic test prioritization.
//!
//! score(test) = change_weight × (changed callees + changed related files)
//!             + failure_weight × past failures
//!
//! Linear on purpose: no normalization, no decay, no cross-test signal.
//! Ranking is a stable sort on descending score, so equal scores keep
//! call graph discovery order.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    core::{callgraph::CallGraph, changes::ChangeSet, ledger::FailureLedger},
    infra::config::ScoringConfig,
};

/// Why a test earned points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason
{
    /// Calls a function that changed
    ChangedCallee
    {
        name: String
    },
    /// Depends on a file that changed
    ChangedFile
    {
        path: String
    },
    /// Failed in earlier full runs
    PastFailures
    {
        count: u64
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredTest
{
    pub test: String,
    pub score: u64,
    pub reasons: Vec<Reason>,
}

/// Outcome of a prioritization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prioritization
{
    /// Ordered selection, best first
    Ranked(Vec<String>),
    /// No test cleared the baseline (or there were no tests)
    Nothing,
}

impl Prioritization
{
    pub fn into_tests(self) -> Vec<String>
    {
        match self
        {
            Prioritization::Ranked(tests) => tests,
            Prioritization::Nothing => Vec::new(),
        }
    }
}

/// Every test's score plus the selection derived from them.
#[derive(Debug, Clone)]
pub struct Ranking
{
    /// All tests, sorted best first
    pub scores: Vec<ScoredTest>,
    pub selection: Prioritization,
}

pub struct ScoringEngine
{
    change_weight: u64,
    failure_weight: u64,
    related_files: Vec<String>,
    keep_unscored: bool,
    limit: Option<usize>,
}

impl ScoringEngine
{
    pub fn from_config(cfg: &ScoringConfig) -> Self
    {
        Self {
            change_weight: cfg.change_weight,
            failure_weight: cfg.failure_weight,
            related_files: cfg
                .related_files
                .clone(),
            keep_unscored: cfg.keep_unscored,
            limit: cfg.limit,
        }
    }

    /// Score one test.
    pub fn score_test(
        &self,
        test: &str,
        callees: impl IntoIterator<Item = impl AsRef<str>>,
        changes: &ChangeSet,
        ledger: &FailureLedger,
    ) -> ScoredTest
    {
        let mut score = 0u64;
        let mut reasons = Vec::new();

        for callee in callees
        {
            let callee = callee.as_ref();
            if changes
                .functions
                .contains(callee)
            {
                score = score.saturating_add(self.change_weight);
                reasons.push(Reason::ChangedCallee { name: callee.to_string() });
            }
        }

        for file in &self.related_files
        {
            if changes.touches_file(file)
            {
                score = score.saturating_add(self.change_weight);
                reasons.push(Reason::ChangedFile { path: file.clone() });
            }
        }

        let failures = ledger.count(test);
        if failures > 0
        {
            score = score.saturating_add(failures.saturating_mul(self.failure_weight));
            reasons.push(Reason::PastFailures { count: failures });
        }

        ScoredTest { test: test.to_string(), score, reasons }
    }

    /// Score every test in `graph` and build the selection.
    #[instrument(skip_all, fields(tests = graph.len()))]
    pub fn rank(
        &self,
        graph: &CallGraph,
        changes: &ChangeSet,
        ledger: &FailureLedger,
    ) -> Ranking
    {
        let mut scores: Vec<ScoredTest> = graph
            .iter()
            .map(|(test, callees)| self.score_test(test, callees, changes, ledger))
            .collect();

        // stable: ties stay in discovery order
        scores.sort_by(|a, b| b.score.cmp(&a.score));

        let mut selected: Vec<String> = scores
            .iter()
            .filter(|s| self.keep_unscored || s.score > 0)
            .map(|s| {
                s.test
                    .clone()
            })
            .collect();

        if let Some(limit) = self.limit
        {
            selected.truncate(limit);
        }

        debug!(selected = selected.len(), "ranked tests");

        let selection = if selected.is_empty()
        {
            Prioritization::Nothing
        }
        else
        {
            Prioritization::Ranked(selected)
        };

        Ranking { scores, selection }
    }
}
