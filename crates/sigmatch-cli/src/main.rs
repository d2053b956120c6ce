use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use sigmatch_cli::{BuildArgs, InspectArgs, MatchArgs, OutputFormat, commands};

#[derive(Parser)]
#[command(
    name = "sigmatch",
    about = "Build signature trie datasets and match client signatures against them",
    version,
    author,
    long_about = "A command-line tool for building position-indexed signature trie datasets from pattern lists and finding the closest pattern for a client signature."
)]
struct Cli {
    /// Set the logging level (RUST_LOG takes precedence)
    #[arg(short, long, value_enum, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a dataset from a pattern file
    Build(BuildArgs),

    /// Find the best matching pattern for each target
    Match(MatchArgs),

    /// Show the header and layout of a dataset
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::from(cli.log_level).as_str())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::handle(args, cli.format)?,
        Commands::Match(args) => commands::matching::handle(args, cli.format)?,
        Commands::Inspect(args) => commands::inspect::handle(args, cli.format)?,
    }

    Ok(())
}
