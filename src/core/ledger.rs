//! Failure ledger: cumulative failure counts per test, persisted as a
//! pretty-printed JSON object.
//!
//! The ledger is read once per invocation and written only after a full
//! run. Every write replaces the whole file. There is no locking, so two
//! concurrent full runs against one file keep the last writer's counts.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::infra::io::write_atomic;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError
{
    #[error("cannot access {path}: {source}")]
    Io
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger {path} is not a JSON object of failure counts: {source}")]
    Corrupt
    {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("test report {path} is malformed: {source}")]
    BadReport
    {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Structured report written by the executor (pytest-json-report layout).
#[derive(Debug, Deserialize)]
pub struct TestReport
{
    #[serde(default)]
    pub tests: Vec<ReportEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ReportEntry
{
    pub nodeid: String,
    pub outcome: String,
}

impl ReportEntry
{
    /// Bare test identifier: last `::` component, parametrization dropped.
    /// `tests/test_m.py::TestX::test_div[0-1]` → `test_div`.
    pub fn test_id(&self) -> &str
    {
        let last = self
            .nodeid
            .rsplit("::")
            .next()
            .unwrap_or(&self.nodeid);

        last.split('[')
            .next()
            .unwrap_or(last)
    }

    pub fn failed(&self) -> bool
    {
        self.outcome == "failed"
    }
}

/// Handle on the persisted failure counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureLedger
{
    path: PathBuf,
    counts: IndexMap<String, u64>,
}

impl FailureLedger
{
    /// Empty ledger bound to `path`, nothing read.
    pub fn empty(path: impl Into<PathBuf>) -> Self
    {
        Self { path: path.into(), counts: IndexMap::new() }
    }

    /// Ledger held in memory only, for scoring without a file.
    pub fn from_counts<I, K>(
        path: impl Into<PathBuf>,
        counts: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            path: path.into(),
            counts: counts
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    /// Read the ledger at `path`. A missing file is an empty ledger.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError>
    {
        let path = path.as_ref();

        let text = match std::fs::read_to_string(path)
        {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!("no ledger yet, starting empty");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(LedgerError::Io { path: path.to_path_buf(), source }),
        };

        let counts: IndexMap<String, u64> = serde_json::from_str(&text)
            .map_err(|source| LedgerError::Corrupt { path: path.to_path_buf(), source })?;

        Ok(Self { path: path.to_path_buf(), counts })
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// Failure count of `test`, zero if never seen.
    pub fn count(
        &self,
        test: &str,
    ) -> u64
    {
        self.counts
            .get(test)
            .copied()
            .unwrap_or(0)
    }

    pub fn counts(&self) -> &IndexMap<String, u64>
    {
        &self.counts
    }

    pub fn is_empty(&self) -> bool
    {
        self.counts
            .is_empty()
    }

    /// Add every failed entry of `report` to the in-memory counts.
    /// Returns how many failures were recorded.
    pub fn record(
        &mut self,
        report: &TestReport,
    ) -> u64
    {
        let mut recorded = 0;

        for entry in report
            .tests
            .iter()
            .filter(|e| e.failed())
        {
            let count = self
                .counts
                .entry(
                    entry
                        .test_id()
                        .to_string(),
                )
                .or_insert(0);
            *count = count.saturating_add(1);
            recorded += 1;
        }

        recorded
    }

    /// Fold the report at `report_path` into the ledger and persist it.
    /// A missing report is a no-op returning 0.
    #[instrument(skip(self), fields(ledger = %self.path.display()))]
    pub fn update(
        &mut self,
        report_path: &Path,
    ) -> Result<u64, LedgerError>
    {
        let text = match std::fs::read_to_string(report_path)
        {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound =>
            {
                info!(report = %report_path.display(), "no test report, ledger unchanged");
                return Ok(0);
            }
            Err(source) =>
            {
                return Err(LedgerError::Io { path: report_path.to_path_buf(), source });
            }
        };

        let report: TestReport = serde_json::from_str(&text).map_err(|source| {
            LedgerError::BadReport { path: report_path.to_path_buf(), source }
        })?;

        let recorded = self.record(&report);
        self.save()?;

        info!(recorded, tests = self.counts.len(), "ledger updated");
        Ok(recorded)
    }

    /// Overwrite the ledger file with the full mapping.
    pub fn save(&self) -> Result<(), LedgerError>
    {
        let io_err = |source| LedgerError::Io { path: self.path.clone(), source };

        if let Some(parent) = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&self.counts).map_err(|source| {
            LedgerError::Corrupt { path: self.path.clone(), source }
        })?;

        write_atomic(&self.path, json.as_bytes()).map_err(io_err)
    }
}
