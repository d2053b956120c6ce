use crate::output::{print_key_value, print_section_header, to_json};
use crate::{InspectArgs, OutputFormat};
use anyhow::{Context, Result};
use serde::Serialize;
use sigmatch_trie::{AccessMode, DatasetConfig, DatasetHeader, TrieDataset};

/// Summary of a full walk over the nodes list
#[derive(Debug, Default, Serialize)]
struct NodeSummary {
    nodes: u32,
    complete: u32,
    numeric_edges: u64,
    string_edges: u64,
    max_position: i16,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    header: DatasetHeader,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<NodeSummary>,
}

fn summarize(dataset: &TrieDataset) -> Result<NodeSummary> {
    let mut summary = NodeSummary::default();
    for entry in dataset.nodes()?.iter()? {
        let (offset, node) = entry.context("walking the nodes list")?;
        summary.nodes += 1;
        summary.complete += u32::from(node.is_complete());
        summary.string_edges += node.children().len() as u64;
        summary.numeric_edges += node.numeric_children().len() as u64;
        summary.max_position = summary.max_position.max(node.position());
        tracing::trace!("Node {offset} at position {}", node.position());
    }
    Ok(summary)
}

pub fn handle(args: InspectArgs, format: OutputFormat) -> Result<()> {
    let config = DatasetConfig::default().with_access(AccessMode::File);
    let dataset = TrieDataset::open(&args.dataset, &config)
        .with_context(|| format!("opening dataset {}", args.dataset.display()))?;

    let report = InspectReport {
        header: *dataset.header(),
        nodes: args.nodes.then(|| summarize(&dataset)).transpose()?,
    };
    dataset.close();

    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            println!("{}", to_json(&report, format)?);
        }
        OutputFormat::Text => {
            let header = &report.header;
            print_section_header(&format!("Dataset {}", args.dataset.display()));
            print_key_value("Version", header.version, 13);
            for (name, list) in [
                ("Strings", &header.strings),
                ("Nodes", &header.nodes),
                ("Roots", &header.roots),
            ] {
                print_key_value(
                    name,
                    format!(
                        "{} records, {} bytes at {}",
                        list.count, list.length, list.start_position
                    ),
                    13,
                );
            }
            if let Some(nodes) = &report.nodes {
                print_key_value("Complete", nodes.complete, 13);
                print_key_value("String edges", nodes.string_edges, 13);
                print_key_value("Numeric edges", nodes.numeric_edges, 13);
                print_key_value("Max position", nodes.max_position, 13);
            }
        }
    }
    Ok(())
}
