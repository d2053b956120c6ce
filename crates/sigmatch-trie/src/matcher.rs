//! Longest-match search over the trie with numeric fallback
//!
//! Each root whose characters appear in the target at the root's position is
//! walked depth-first. At every node the matcher tries, in order:
//!
//! 1. the string child matching the target bytes just below the node
//! 2. numeric children nearest to the digit run just below the node,
//!    adding each accepted difference to the result's score
//! 3. the node itself, when it is complete
//!
//! The outcome depends only on dataset content. Caches change how often
//! records are decoded, never which nodes are visited.

use crate::dataset::TrieDataset;
use crate::error::{TrieError, TrieResult};
use crate::node::Node;
use crate::numeric::{NumericCursor, target_value};
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// Final outcome of evaluating one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEvaluation {
    /// The result came through an exactly matching string child
    ExactChildFound,
    /// The result came through a numeric child
    NumericChildFound,
    /// No child produced a result
    NoChildFound,
}

/// One node visited during a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Visit {
    /// Offset of the visited node
    pub node_offset: u32,
    /// Position of the visited node
    pub position: i16,
    /// How the evaluation ended
    pub outcome: NodeEvaluation,
}

/// Result of [`Matcher::find_best`]
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Best complete node, if any pattern matched
    pub node: Option<Arc<Node>>,
    /// Sum of numeric differences accepted on the way to `node`
    pub lowest_score: u32,
    /// Nodes evaluated across all roots
    pub nodes_evaluated: u32,
    /// Roots whose characters matched the target
    pub root_nodes_evaluated: u32,
    /// Every evaluated node, in visiting order
    pub visits: Vec<Visit>,
}

impl MatchResult {
    /// Whether any pattern matched
    pub const fn is_match(&self) -> bool {
        self.node.is_some()
    }

    /// Offset of the matched node
    pub fn node_offset(&self) -> Option<u32> {
        self.node.as_ref().map(|node| node.offset())
    }

    /// Position of the matched node
    pub fn position(&self) -> Option<i16> {
        self.node.as_ref().map(|node| node.position())
    }
}

struct Found {
    node: Arc<Node>,
    score: u32,
}

struct Search<'t> {
    target: &'t [u8],
    nodes_evaluated: u32,
    visits: Vec<Visit>,
}

/// How far the evaluation of a node has progressed
enum Stage {
    Start,
    /// The exact string child is being evaluated
    Exact,
    /// A numeric child `difference` away from the target is being evaluated
    Numeric {
        cursor: NumericCursor,
        difference: u32,
    },
    Done,
}

/// A node on the search stack
struct Frame {
    node: Arc<Node>,
    visit: usize,
    stage: Stage,
}

impl Frame {
    /// Record the visit and start evaluating `node`
    fn enter(node: Arc<Node>, search: &mut Search<'_>) -> Self {
        search.nodes_evaluated += 1;
        let visit = search.visits.len();
        search.visits.push(Visit {
            node_offset: node.offset(),
            position: node.position(),
            outcome: NodeEvaluation::NoChildFound,
        });
        Self {
            node,
            visit,
            stage: Stage::Start,
        }
    }
}

/// Runs searches against one dataset
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    dataset: &'a TrieDataset,
}

impl<'a> Matcher<'a> {
    /// Matcher over `dataset`
    pub const fn new(dataset: &'a TrieDataset) -> Self {
        Self { dataset }
    }

    /// Find the most specific complete node for `target`
    ///
    /// Among roots, the match with the greatest position wins, then the
    /// lowest score, then the earliest root.
    pub fn find_best(&self, target: &[u8]) -> TrieResult<MatchResult> {
        let mut search = Search {
            target,
            nodes_evaluated: 0,
            visits: Vec::new(),
        };
        let mut root_nodes_evaluated = 0;
        let mut best: Option<Found> = None;

        for index in 0..self.dataset.root_count() {
            let root = self.dataset.root(index)?;
            if !root.matches_target(target, self.dataset)? {
                continue;
            }
            root_nodes_evaluated += 1;

            if let Some(found) = self.evaluate(root, &mut search)? {
                let better = best.as_ref().is_none_or(|current| {
                    let (position, current_position) =
                        (found.node.position(), current.node.position());
                    position > current_position
                        || (position == current_position && found.score < current.score)
                });
                if better {
                    best = Some(found);
                }
            }
        }

        let (node, lowest_score) = best.map_or((None, 0), |found| (Some(found.node), found.score));
        Ok(MatchResult {
            node,
            lowest_score,
            nodes_evaluated: search.nodes_evaluated,
            root_nodes_evaluated,
            visits: search.visits,
        })
    }

    /// Depth-first search below `root`, on an explicit stack
    ///
    /// The first complete node reached ends the search; the differences of
    /// the numeric edges on its path make up the score.
    fn evaluate(&self, root: Arc<Node>, search: &mut Search<'_>) -> TrieResult<Option<Found>> {
        let mut stack = vec![Frame::enter(root, search)];

        while let Some(frame) = stack.last_mut() {
            if let Some(child) = self.next_child(frame, search.target)? {
                stack.push(Frame::enter(child, search));
                continue;
            }

            finish(search, frame.visit, NodeEvaluation::NoChildFound);
            let Some(done) = stack.pop() else {
                break;
            };
            if !done.node.is_complete() {
                continue;
            }

            let mut found = Found {
                node: done.node,
                score: 0,
            };
            while let Some(parent) = stack.pop() {
                let outcome = match parent.stage {
                    Stage::Numeric { difference, .. } => {
                        found.score = found.score.saturating_add(difference);
                        NodeEvaluation::NumericChildFound
                    }
                    _ => NodeEvaluation::ExactChildFound,
                };
                finish(search, parent.visit, outcome);
            }
            return Ok(Some(found));
        }

        Ok(None)
    }

    /// Next child of `frame` to descend into: the exact string child first,
    /// then numeric children nearest first
    fn next_child(&self, frame: &mut Frame, target: &[u8]) -> TrieResult<Option<Arc<Node>>> {
        let Frame { node, stage, .. } = frame;
        loop {
            match stage {
                Stage::Start => {
                    *stage = Stage::Exact;
                    if let Some(entry) = node.find_child(target, self.dataset)? {
                        return self.child(node, entry.related_offset()).map(Some);
                    }
                }
                Stage::Exact => {
                    *stage = match target_value(target, node.next_index()) {
                        Some(value) if node.has_numeric_children() => Stage::Numeric {
                            cursor: NumericCursor::new(node.numeric_children(), value),
                            difference: 0,
                        },
                        _ => Stage::Done,
                    };
                }
                Stage::Numeric { cursor, difference } => {
                    let children = node.numeric_children();
                    let Some((index, accepted)) = cursor.advance(children) else {
                        *stage = Stage::Done;
                        continue;
                    };
                    let Some(candidate) = children.get(index) else {
                        *stage = Stage::Done;
                        continue;
                    };
                    *difference = accepted;
                    return self.child(node, candidate.related_offset).map(Some);
                }
                Stage::Done => return Ok(None),
            }
        }
    }

    fn child(&self, parent: &Node, offset: u32) -> TrieResult<Arc<Node>> {
        let child = self.dataset.node(offset)?;
        if child.position() <= parent.position() {
            return Err(TrieError::Corrupt(format!(
                "node {offset} at position {} is a child of node {} at position {}",
                child.position(),
                parent.offset(),
                parent.position()
            )));
        }
        Ok(child)
    }

    /// Chain of nodes from the root down to `node`
    pub fn node_chain(&self, node: &Arc<Node>) -> TrieResult<Vec<Arc<Node>>> {
        let mut chain = vec![Arc::clone(node)];
        let mut current = Arc::clone(node);
        while let Some(parent) = current.parent(self.dataset)? {
            if parent.position() >= current.position() {
                return Err(TrieError::Corrupt(format!(
                    "parent chain of node {} does not descend at node {}",
                    node.offset(),
                    parent.offset()
                )));
            }
            chain.push(Arc::clone(&parent));
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Render the matched characters at their target positions, `_` elsewhere
    pub fn describe(&self, result: &MatchResult, target: &[u8]) -> TrieResult<String> {
        let mut rendered = vec!['_'; target.len()];

        if let Some(node) = &result.node {
            for link in self.node_chain(node)? {
                let Some(characters) = link.characters(self.dataset)? else {
                    continue;
                };
                let Some(start) = link.next_index().checked_sub(characters.len()) else {
                    continue;
                };
                for (slot, &byte) in rendered.iter_mut().skip(start).zip(characters) {
                    *slot = if byte.is_ascii_graphic() || byte == b' ' {
                        char::from(byte)
                    } else {
                        '?'
                    };
                }
            }
        }

        Ok(rendered.into_iter().collect())
    }
}

fn finish(search: &mut Search<'_>, visit: usize, outcome: NodeEvaluation) {
    if let Some(entry) = search.visits.get_mut(visit) {
        entry.outcome = outcome;
        trace!(
            "Node {} at position {}: {:?}",
            entry.node_offset, entry.position, outcome
        );
    }
}
