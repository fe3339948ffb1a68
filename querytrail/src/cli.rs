use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use querytrail_core::config::ExporterConfig;
use querytrail_core::logging::LogFormat;
use querytrail_core::source::check_log_file;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "querytrail",
    version,
    about = "Follows a ClickHouse server log and exports per-query metrics",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that a log file can be followed, then exit
    Check {
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Server log file to follow
    pub file: Option<PathBuf>,

    /// Read the whole file instead of starting at its end
    #[arg(long)]
    pub from_start: bool,

    /// Address of the metrics endpoint
    #[arg(long)]
    pub listen: Option<String>,

    /// Optional TOML config file; command-line flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Append fully described queries as JSON lines to this file
    #[arg(long)]
    pub completed_output: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

impl RunArgs {
    /// Load the config file, if any, and apply command-line overrides.
    pub fn into_config(self) -> Result<ExporterConfig> {
        let mut cfg = match &self.config {
            Some(path) => ExporterConfig::from_file(path)?,
            None => ExporterConfig::default(),
        };

        if let Some(file) = self.file {
            cfg.source.path = Some(file);
        }
        if self.from_start {
            cfg.source.from_start = true;
        }
        if let Some(listen) = self.listen {
            cfg.metrics.listen = listen;
        }
        if let Some(output) = self.completed_output {
            cfg.output.completed_output = Some(output);
        }

        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

pub fn check(file: &Path) -> Result<()> {
    check_log_file(file).with_context(|| format!("{} can't be followed", file.display()))?;
    println!("{}: ok", file.display());
    Ok(())
}
