use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "prun")]
#[command(
    about = "Run the tests most likely to catch a regression first, ranked from call graphs, diffs and past failures"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress and report output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be executed without running tests
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run tests in full or prioritized mode
    Run(RunArgs),

    /// Print the test-to-callee map of test files
    Graph(GraphArgs),

    /// Print the functions and files changed against the baseline
    Changed(ChangedArgs),

    /// Score and rank tests without running them
    Score(ScoreArgs),

    /// Inspect or update the failure ledger
    Ledger(LedgerArgs),

    /// Initialize a priorun.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where change information comes from
#[derive(Args, Debug, Clone, Default)]
pub struct DiffArgs {
    /// Read a unified diff from this file instead of running git
    #[arg(long, value_name = "FILE")]
    pub diff_file: Option<PathBuf>,

    /// Baseline revision for `git diff` (overrides config)
    #[arg(long, value_name = "REV")]
    pub base: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Test files or directories (defaults to config `tests`)
    pub tests: Vec<PathBuf>,

    /// Run mode; defaults to full when $ENV is `prod`, prioritized otherwise
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Re-rank the selection with the language-model advisor
    #[arg(long)]
    pub advisor: bool,

    #[command(flatten)]
    pub diff: DiffArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Full,
    Prioritized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Test files or directories (defaults to config `tests`)
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ChangedArgs {
    #[command(flatten)]
    pub diff: DiffArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Test files or directories (defaults to config `tests`)
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub diff: DiffArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub action: LedgerAction,
}

#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Print the recorded failure counts
    Show {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Fold an existing test report into the ledger
    Update {
        /// JSON report to read (defaults to config `report_path`)
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
