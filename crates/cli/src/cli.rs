//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// vidquery - declarative queries over tracked objects in video
#[derive(Parser, Debug)]
#[command(
    name = "vidquery",
    author,
    version,
    about = "Video object query engine",
    long_about = "Runs declarative queries over the objects of a video.\n\n\
                  Frames are read from a source, objects are detected and tracked, \n\
                  derived properties are evaluated with per-track history, and every \n\
                  object satisfying the query is reported as a JSON line."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "VIDQUERY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "VIDQUERY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a built-in query over the configured video
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// List built-in queries and registered detectors
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "vidquery.toml",
        env = "VIDQUERY_CONFIG"
    )]
    pub config: PathBuf,

    /// Built-in query to run (see `vidquery info --queries`)
    #[arg(long, default_value = "all_objects", env = "VIDQUERY_QUERY")]
    pub query: String,

    /// Override output.save_path from configuration
    #[arg(short, long, env = "VIDQUERY_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Emit a record for every frame, including frames without matches
    #[arg(long)]
    pub all_frames: bool,

    /// Maximum number of frames to process (0 = unlimited)
    #[arg(long, default_value = "0", env = "VIDQUERY_MAX_FRAMES")]
    pub max_frames: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "VIDQUERY_METRICS_PORT")]
    pub metrics_port: u16,

    /// Compile the query and print the plan without running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(default_value = "vidquery.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show built-in queries and their plans
    #[arg(long)]
    pub queries: bool,

    /// Show registered detectors
    #[arg(long)]
    pub detectors: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "vidquery",
            "-vv",
            "run",
            "--config",
            "launch.toml",
            "--query",
            "fast_person",
            "--output",
            "out.jsonl",
            "--all-frames",
            "--max-frames",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.query, "fast_person");
        assert_eq!(args.output, Some(PathBuf::from("out.jsonl")));
        assert!(args.all_frames);
        assert_eq!(args.max_frames, 10);
        assert_eq!(args.metrics_port, 0);
    }

    #[test]
    fn test_parse_validate_positional() {
        let cli = Cli::try_parse_from(["vidquery", "validate", "cfg.json", "--json"]).unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.config, PathBuf::from("cfg.json"));
        assert!(args.json);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["vidquery", "-q", "-v", "info"]).is_err());
    }
}
