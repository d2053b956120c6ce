use crate::output::{print_key_value, to_json};
use crate::{BuildArgs, OutputFormat};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use sigmatch_trie::DatasetBuilder;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct BuildSummary {
    output: PathBuf,
    patterns: usize,
    nodes: usize,
    roots: usize,
    bytes: usize,
}

/// Patterns in `contents`: one per line, blank lines and `#` comments skipped
pub fn parse_patterns(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

pub fn handle(args: BuildArgs, format: OutputFormat) -> Result<()> {
    let contents = std::fs::read_to_string(&args.patterns)
        .with_context(|| format!("reading patterns from {}", args.patterns.display()))?;

    let mut builder = DatasetBuilder::new();
    let mut patterns = 0;
    for (index, pattern) in parse_patterns(&contents).enumerate() {
        builder
            .add_pattern(pattern.as_bytes())
            .with_context(|| format!("pattern {} '{pattern}'", index + 1))?;
        patterns += 1;
    }
    if patterns == 0 {
        bail!("{} contains no patterns", args.patterns.display());
    }
    debug!("Parsed {patterns} patterns");

    let bytes = builder.build()?;
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("writing dataset to {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());

    let summary = BuildSummary {
        output: args.output,
        patterns,
        nodes: builder.node_count(),
        roots: builder.root_count(),
        bytes: bytes.len(),
    };

    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            println!("{}", to_json(&summary, format)?);
        }
        OutputFormat::Text => {
            println!("Built {}", summary.output.display());
            print_key_value("Patterns", summary.patterns, 9);
            print_key_value("Nodes", summary.nodes, 9);
            print_key_value("Roots", summary.roots, 9);
            print_key_value("Bytes", summary.bytes, 9);
        }
    }
    Ok(())
}
