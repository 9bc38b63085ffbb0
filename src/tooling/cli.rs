//! CLI Tooling
//!
//! Command-line interface for the hive sweep. The binary does one job, so
//! the surface is flags only: pick the store, the output format, and the
//! logging setup, then run the sweep over every hive.

use crate::config::{ConfigLoader, RehomeConfig};
use crate::error::ToolError;
use crate::logging::LoggingConfig;
use crate::report::{format_sweep_text, SweepReport};
use crate::rewrite::RewritePlan;
use crate::store::persistence::SledStore;
use crate::tree::HiveSweep;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Process exit status when a hive root cannot be opened.
pub const EXIT_ROOT_OPEN_FAILED: i32 = 2;

/// Rehome CLI - rewrite stale home-directory paths across the store
#[derive(Parser)]
#[command(name = "rehome")]
#[command(about = "Rewrites stale home-directory paths across a registry-style store")]
pub struct Cli {
    /// Store database directory (defaults to the platform data directory)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Skip the press-enter acknowledgment after a successful sweep
    #[arg(long)]
    pub no_pause: bool,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Report rendering selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ToolError::Config(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }
}

/// Resolved execution context for the CLI.
#[derive(Debug)]
pub struct CliContext {
    config: RehomeConfig,
    store_path: PathBuf,
    format: OutputFormat,
}

impl CliContext {
    /// Create a new CLI context: load config, fold in the logging flags,
    /// and resolve the store path.
    pub fn new(cli: &Cli) -> Result<Self, ToolError> {
        let mut config = match &cli.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
        .map_err(|e| ToolError::Config(e.to_string()))?;

        apply_log_overrides(&mut config.logging, cli);

        let store_path = match &cli.store {
            Some(path) => path.clone(),
            None => config.store.resolve_path()?,
        };
        let format = cli.format.parse()?;

        Ok(Self {
            config,
            store_path,
            format,
        })
    }

    /// Logging configuration after CLI overrides.
    pub fn logging(&self) -> &LoggingConfig {
        &self.config.logging
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Open the store, sweep every hive, and render the report.
    pub fn execute(&self) -> Result<String, ToolError> {
        std::fs::create_dir_all(&self.store_path).map_err(|e| ToolError::Store {
            path: self.store_path.display().to_string(),
            message: format!("Failed to create store directory: {}", e),
        })?;
        let store = SledStore::open(&self.store_path).map_err(|e| ToolError::Store {
            path: self.store_path.display().to_string(),
            message: e.to_string(),
        })?;

        let plan = RewritePlan::default();
        info!(
            store = %self.store_path.display(),
            target = plan.target(),
            replacement = plan.replacement(),
            "starting sweep"
        );
        let report = HiveSweep::new(&store, &plan).run()?;
        store.flush().map_err(|e| ToolError::Store {
            path: self.store_path.display().to_string(),
            message: e.to_string(),
        })?;

        self.render(&report)
    }

    fn render(&self, report: &SweepReport) -> Result<String, ToolError> {
        match self.format {
            OutputFormat::Text => Ok(format_sweep_text(report)),
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|e| ToolError::Report(e.to_string())),
        }
    }
}

/// Fold the logging flags into the loaded config. CLI beats config; the
/// specific `--log-level` beats the blanket `--verbose`.
fn apply_log_overrides(logging: &mut LoggingConfig, cli: &Cli) {
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let cli = Cli::try_parse_from(["rehome"]).unwrap();
        assert_eq!(cli.store, None);
        assert_eq!(cli.config, None);
        assert_eq!(cli.format, "text");
        assert!(!cli.no_pause);
        assert!(!cli.verbose);
        assert_eq!(cli.log_level, None);
    }

    #[test]
    fn parse_full_flag_set() {
        let cli = Cli::try_parse_from([
            "rehome",
            "--store",
            "/tmp/store",
            "--config",
            "/tmp/config.toml",
            "--format",
            "json",
            "--no-pause",
            "--verbose",
            "--log-level",
            "trace",
            "--log-format",
            "json",
            "--log-output",
            "file",
            "--log-file",
            "/tmp/rehome.log",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/store")));
        assert_eq!(cli.format, "json");
        assert!(cli.no_pause);
        assert_eq!(cli.log_output.as_deref(), Some("file"));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["rehome", "--frobnicate"]).is_err());
    }

    #[test]
    fn format_must_be_text_or_json() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn verbose_sets_debug_unless_level_given() {
        let cli = Cli::try_parse_from(["rehome", "--verbose"]).unwrap();
        let mut logging = LoggingConfig::default();
        apply_log_overrides(&mut logging, &cli);
        assert_eq!(logging.level, "debug");

        let cli = Cli::try_parse_from(["rehome", "--verbose", "--log-level", "warn"]).unwrap();
        let mut logging = LoggingConfig::default();
        apply_log_overrides(&mut logging, &cli);
        assert_eq!(logging.level, "warn");
    }

    #[test]
    fn log_flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "rehome",
            "--log-format",
            "json",
            "--log-output",
            "file+stderr",
            "--log-file",
            "/tmp/r.log",
        ])
        .unwrap();
        let mut logging = LoggingConfig::default();
        logging.format = "text".to_string();
        apply_log_overrides(&mut logging, &cli);
        assert_eq!(logging.format, "json");
        assert_eq!(logging.output, "file+stderr");
        assert_eq!(logging.file, Some(PathBuf::from("/tmp/r.log")));
    }
}
