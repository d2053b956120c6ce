//! Command handlers for the `sigmatch` binary

pub mod commands;
pub mod output;

pub use crate::commands::{
    build::handle as handle_build, inspect::handle as handle_inspect,
    matching::handle as handle_match,
};

use clap::Args;
use sigmatch_trie::{AccessMode, CacheStrategy};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output, one document per line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// Arguments of `sigmatch build`
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Pattern file, one pattern per line
    #[arg(short, long)]
    pub patterns: PathBuf,

    /// Dataset file to write
    #[arg(long)]
    pub output: PathBuf,
}

/// Arguments of `sigmatch match`
#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Dataset file
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// JSON dataset configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override how the dataset file is accessed (mapped, file, memory)
    #[arg(long)]
    pub access: Option<AccessMode>,

    /// Override the cache strategy of every list (lru, switching)
    #[arg(long)]
    pub strategy: Option<CacheStrategy>,

    /// Include the visited nodes in the output
    #[arg(long)]
    pub visits: bool,

    /// Print cache and pool statistics after matching
    #[arg(long)]
    pub stats: bool,

    /// Targets to match; read from stdin, one per line, when empty
    pub targets: Vec<String>,
}

/// Arguments of `sigmatch inspect`
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Dataset file
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Decode every node and summarize the trie
    #[arg(long)]
    pub nodes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_debug() {
        assert_eq!(format!("{:?}", OutputFormat::Text), "Text");
        assert_eq!(format!("{:?}", OutputFormat::Json), "Json");
        assert_eq!(format!("{:?}", OutputFormat::JsonPretty), "JsonPretty");
    }
}
