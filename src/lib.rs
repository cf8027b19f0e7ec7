//! **priorun** - Change-aware test prioritization
//!
//! Tree-sitter call graphs of test files, function-level change detection
//! from unified diffs and a persisted failure ledger combine into a linear
//! score; the highest-scoring tests run first. An optional language-model
//! advisor may re-rank the selection.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - call graph, change set, ledger, scoring, execution
pub mod core {
    /// Test → callee mapping, adapter trait and syntax-error diagnostics
    pub mod callgraph;
    pub use callgraph::{CallGraph, CallGraphExtractor, ParseError, build_call_graph};

    /// Unified-diff change detection (hunk-level or file-level)
    pub mod changes;
    pub use changes::{ChangeDetector, ChangeSet, DiffSource};

    /// Persisted failure counts fed by full-run reports
    pub mod ledger;
    pub use ledger::FailureLedger;

    /// Linear scoring and ranking
    pub mod scoring;
    pub use scoring::{Prioritization, ScoringEngine};

    /// Advisory re-ranking through a chat-completions endpoint
    pub mod advisor;

    /// Full and prioritized run orchestration
    pub mod runner;
    pub use runner::{Mode, RunController, RunOutcome};

    /// Text and table views
    pub mod render;
}

/// Language adapters - tree-sitter call graph extraction
pub mod parsers {
    /// Python tests: `def test_*` at module level
    pub mod python_parser;
    pub use python_parser::PythonCallGraphExtractor;

    /// Rust tests: `fn test_*` at file or inline-module level
    pub mod rust_parser;
    pub use rust_parser::RustCallGraphExtractor;

    // Re-export common extractor interface
    pub use crate::core::callgraph::{CallGraphExtractor, get_extractor};
}

/// Infrastructure - Configuration, I/O, and test discovery
pub mod infra {
    /// Layered configuration (file + PRIORUN_* environment)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Memory-mapped reads for large files, atomic writes
    pub mod io;
    pub use io::{FileContent, read_file_smart, write_atomic};

    /// Gitignore-aware test file discovery
    pub mod walk;
    pub use walk::TestFileWalker;
}

/// Command handlers
pub mod cli_ext {
    /// Test file and diff source resolution
    pub mod inputs;

    /// `graph`, `changed` and `score`
    pub mod inspect_cmd;

    /// `ledger show` / `ledger update`
    pub mod ledger_cmd;

    /// `run`
    pub mod run_cmd;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, TestFileWalker, load_config};
pub use parsers::{PythonCallGraphExtractor, RustCallGraphExtractor};
