use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// File names probed, in priority order, for a project config.
const CONFIG_FILES: [&str; 4] = ["priorun.toml", "priorun.yaml", "priorun.json", ".priorun.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Test files or directories to analyse
    pub tests: Vec<PathBuf>,

    /// File-name globs that identify test files inside directories
    pub test_globs: Vec<String>,

    /// Ignore patterns applied while walking (in addition to .gitignore)
    pub ignore_patterns: Vec<String>,

    /// Persisted failure ledger
    pub ledger_path: PathBuf,

    /// JSON report written by the executor on full runs
    pub report_path: PathBuf,

    /// Environment variable holding the run mode (`prod` = full run)
    pub mode_env: String,

    /// Change detection settings
    pub diff: DiffConfig,

    /// Heuristic scoring settings
    pub scoring: ScoringConfig,

    /// External test executor settings
    pub executor: ExecutorConfig,

    /// Advisory re-ranker settings
    pub advisor: AdvisorConfig,
}

/// How diff text is turned into a change set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStrategy
{
    /// Function names found near hunk starts
    Function,
    /// Every changed source file
    File,
}

/// What a prioritized run does when nothing scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnEmpty
{
    /// Run nothing
    Skip,
    /// Fall back to a full run
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig
{
    /// Baseline revision the working tree is compared against
    pub base: String,
    pub strategy: ChangeStrategy,
    /// Lookahead window (lines) after file and hunk headers
    pub window: usize,
    /// Source file extensions whose hunks are scanned
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig
{
    pub change_weight: u64,
    pub failure_weight: u64,
    /// Files every test is assumed to depend on
    pub related_files: Vec<String>,
    /// Keep zero-scored tests at the tail of the selection
    pub keep_unscored: bool,
    /// Truncate the selection to the top N
    pub limit: Option<usize>,
    pub on_empty: OnEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig
{
    pub program: String,
    /// Extra arguments passed before the mode-specific ones
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig
{
    pub enabled: bool,
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            tests: vec![PathBuf::from(".")],
            test_globs: vec!["test_*.py".to_string(), "*_test.py".to_string()],
            ignore_patterns: vec![
                "**/target/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.venv/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
            ledger_path: PathBuf::from("failure_log.json"),
            report_path: PathBuf::from("report.json"),
            mode_env: "ENV".to_string(),
            diff: DiffConfig::default(),
            scoring: ScoringConfig::default(),
            executor: ExecutorConfig::default(),
            advisor: AdvisorConfig::default(),
        }
    }
}

impl Default for DiffConfig
{
    fn default() -> Self
    {
        Self {
            base: "origin/main".to_string(),
            strategy: ChangeStrategy::Function,
            window: 5,
            extensions: vec!["py".to_string()],
        }
    }
}

impl Default for ScoringConfig
{
    fn default() -> Self
    {
        Self {
            change_weight: 5,
            failure_weight: 2,
            related_files: vec!["source_code.py".to_string()],
            keep_unscored: false,
            limit: None,
            on_empty: OnEmpty::Skip,
        }
    }
}

impl Default for ExecutorConfig
{
    fn default() -> Self
    {
        Self { program: "pytest".to_string(), args: Vec::new() }
    }
}

impl Default for AdvisorConfig
{
    fn default() -> Self
    {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Load configuration from the current directory.
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load configuration with `root` as the project directory.
pub fn load_config_from(root: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // First config file found wins
    for name in &CONFIG_FILES
    {
        let path = root.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // PRIORUN_SCORING__CHANGE_WEIGHT=10 → scoring.change_weight
    builder = builder.add_source(
        config::Environment::with_prefix("PRIORUN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("priorun.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
