use crate::output::{print_key_value, print_section_header, to_json};
use crate::{MatchArgs, OutputFormat};
use anyhow::{Context, Result};
use serde::Serialize;
use sigmatch_trie::{DatasetConfig, MatchResult, TrieDataset, Visit};
use std::io::BufRead;
use tracing::debug;

#[derive(Debug, Serialize)]
struct MatchReport<'a> {
    target: &'a str,
    matched: bool,
    node_offset: Option<u32>,
    position: Option<i16>,
    score: u32,
    description: String,
    nodes_evaluated: u32,
    root_nodes_evaluated: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    visits: Option<&'a [Visit]>,
}

impl<'a> MatchReport<'a> {
    fn new(
        dataset: &TrieDataset,
        target: &'a str,
        result: &'a MatchResult,
        visits: bool,
    ) -> Result<Self> {
        Ok(Self {
            target,
            matched: result.is_match(),
            node_offset: result.node_offset(),
            position: result.position(),
            score: result.lowest_score,
            description: dataset.matcher().describe(result, target.as_bytes())?,
            nodes_evaluated: result.nodes_evaluated,
            root_nodes_evaluated: result.root_nodes_evaluated,
            visits: visits.then_some(result.visits.as_slice()),
        })
    }

    fn print_text(&self) {
        println!("{}", self.target);
        if !self.matched {
            println!("  no match");
            return;
        }
        print_key_value("Match", &self.description, 9);
        if let Some(position) = self.position {
            print_key_value("Position", position, 9);
        }
        print_key_value("Score", self.score, 9);
        print_key_value(
            "Nodes",
            format!(
                "{} evaluated from {} roots",
                self.nodes_evaluated, self.root_nodes_evaluated
            ),
            9,
        );
        for visit in self.visits.unwrap_or_default() {
            println!(
                "    node {:>8} at {:>4}: {:?}",
                visit.node_offset, visit.position, visit.outcome
            );
        }
    }
}

/// Apply the command-line overrides on top of the configuration file
pub fn dataset_config(args: &MatchArgs) -> Result<DatasetConfig> {
    let mut config = match &args.config {
        Some(path) => DatasetConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => DatasetConfig::default(),
    };
    if let Some(access) = args.access {
        config = config.with_access(access);
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    Ok(config)
}

fn read_targets(args: &MatchArgs) -> Result<Vec<String>> {
    if !args.targets.is_empty() {
        return Ok(args.targets.clone());
    }
    debug!("Reading targets from stdin");
    std::io::stdin()
        .lock()
        .lines()
        .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
        .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
        .collect::<std::io::Result<_>>()
        .context("reading targets from stdin")
}

pub fn handle(args: MatchArgs, format: OutputFormat) -> Result<()> {
    let config = dataset_config(&args)?;
    let dataset = TrieDataset::open(&args.dataset, &config)
        .with_context(|| format!("opening dataset {}", args.dataset.display()))?;
    let targets = read_targets(&args)?;

    for target in &targets {
        let result = dataset
            .find_best(target.as_bytes())
            .with_context(|| format!("matching '{target}'"))?;
        let report = MatchReport::new(&dataset, target, &result, args.visits)?;
        match format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                println!("{}", to_json(&report, format)?);
            }
            OutputFormat::Text => report.print_text(),
        }
    }

    if args.stats {
        let stats = dataset.stats();
        match format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                println!("{}", to_json(&serde_json::json!({ "stats": stats }), format)?);
            }
            OutputFormat::Text => {
                println!();
                print_section_header("Statistics");
                for (name, cache) in [
                    ("Strings", stats.strings),
                    ("Nodes", stats.nodes),
                    ("Roots", stats.roots),
                ] {
                    print_key_value(
                        name,
                        format!(
                            "{}/{} entries, {} requests, {:.1}% hits",
                            cache.entries,
                            cache.capacity,
                            cache.requests,
                            cache.hit_ratio() * 100.0
                        ),
                        9,
                    );
                }
                print_key_value(
                    "Readers",
                    format!("{} created, {} idle", stats.pool.created, stats.pool.idle),
                    9,
                );
            }
        }
    }

    dataset.close();
    Ok(())
}
