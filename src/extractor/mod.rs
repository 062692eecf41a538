//! Candidate extraction.
//!
//! Walks the host document once per pass in document order and proposes a
//! bounded list of [`Candidate`]s. At each node the structural matchers are
//! tried first; when none applies, a text-density heuristic decides whether
//! the node is a self-contained block of content. A captured node's subtree
//! is never descended. A node processed in an earlier pass is skipped with
//! its subtree while it would still qualify; once it outgrows the bounds
//! (a feed that keeps loading posts) its children are considered again.

pub mod matchers;

use crate::config::{ExtractionConfig, FilterConfig};
use crate::filter::FilterPolicy;
use crate::ledger::DedupLedger;
use crate::text;
use crate::tree::{DocumentTree, TextLimits};
use crate::types::{Candidate, ExtractionError, NodeId, Viewport};
use std::collections::HashSet;
use tracing::{debug, trace};

pub use matchers::{MatcherSet, StructuralMatcher, DEFAULT_MATCHERS};

/// What to do with a node after evaluating it
enum Visit {
    /// Emit as a candidate and do not descend
    Capture(Candidate),
    /// Continue into the children
    Descend,
    /// Skip the node together with its subtree
    Skip,
}

/// Per-pass counters, logged at debug level
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionStats {
    pub nodes_visited: usize,
    pub nodes_vanished: usize,
    pub candidates: usize,
    pub hit_node_cap: bool,
}

pub struct CandidateExtractor {
    config: ExtractionConfig,
    filter: FilterPolicy,
    matchers: MatcherSet,
}

impl CandidateExtractor {
    pub fn new(config: ExtractionConfig, filter: FilterPolicy, matchers: MatcherSet) -> Self {
        Self {
            config,
            filter,
            matchers,
        }
    }

    /// Extractor with the built-in matchers
    pub fn with_config(config: ExtractionConfig, filter: FilterConfig) -> Self {
        Self::new(config, FilterPolicy::new(filter), MatcherSet::default())
    }

    pub fn filter(&self) -> &FilterPolicy {
        &self.filter
    }

    /// Text beyond these limits can never be captured, so stop reading there
    fn text_limits(&self) -> TextLimits {
        TextLimits {
            max_chars: self.config.max_aggregate_len.max(self.filter.max_text_len()) + 1,
            max_nodes: self.config.max_nodes_visited,
        }
    }

    /// Propose candidates from the current document
    pub fn extract<T: DocumentTree + ?Sized>(&self, tree: &T, ledger: &DedupLedger) -> Vec<Candidate> {
        self.extract_with_stats(tree, ledger).0
    }

    pub fn extract_with_stats<T: DocumentTree + ?Sized>(
        &self,
        tree: &T,
        ledger: &DedupLedger,
    ) -> (Vec<Candidate>, ExtractionStats) {
        let mut stats = ExtractionStats::default();
        let Some(root) = tree.root() else {
            debug!("No document attached");
            return (Vec::new(), stats);
        };

        let viewport = tree.viewport().with_margin(self.config.viewport_margin);
        let mut candidates = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut captured: HashSet<u64> = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if candidates.len() >= self.config.max_candidates {
                break;
            }
            if stats.nodes_visited >= self.config.max_nodes_visited {
                stats.hit_node_cap = true;
                break;
            }
            // Irregular hosts may report a node under more than one parent
            if !visited.insert(id) {
                continue;
            }
            stats.nodes_visited += 1;

            match self.evaluate(tree, id, &viewport, ledger, &captured) {
                Ok(Visit::Capture(candidate)) => {
                    trace!(
                        "Captured {} via {}",
                        id,
                        candidate.matched_by.unwrap_or("text density")
                    );
                    captured.insert(candidate.fingerprint);
                    candidates.push(candidate);
                }
                Ok(Visit::Skip) => {}
                Ok(Visit::Descend) => match tree.children(id) {
                    // Reverse so the stack pops in document order
                    Ok(children) => stack.extend(children.into_iter().rev()),
                    Err(e) => {
                        stats.nodes_vanished += 1;
                        trace!("Skipping children: {}", e);
                    }
                },
                Err(e) => {
                    stats.nodes_vanished += 1;
                    trace!("Skipping node: {}", e);
                }
            }
        }

        stats.candidates = candidates.len();
        debug!(
            "Extraction visited {} nodes, {} candidates{}",
            stats.nodes_visited,
            stats.candidates,
            if stats.hit_node_cap { " (node cap reached)" } else { "" }
        );
        (candidates, stats)
    }

    fn evaluate<T: DocumentTree + ?Sized>(
        &self,
        tree: &T,
        id: NodeId,
        viewport: &Viewport,
        ledger: &DedupLedger,
        captured: &HashSet<u64>,
    ) -> Result<Visit, ExtractionError> {
        let processed = ledger.is_processed(id);
        match self.evaluate_fresh(tree, id, viewport, captured)? {
            // Still a qualifying block: its content was already submitted
            Visit::Capture(_) if processed => Ok(Visit::Skip),
            visit => Ok(visit),
        }
    }

    fn evaluate_fresh<T: DocumentTree + ?Sized>(
        &self,
        tree: &T,
        id: NodeId,
        viewport: &Viewport,
        captured: &HashSet<u64>,
    ) -> Result<Visit, ExtractionError> {
        let info = tree.node(id)?;
        if !self.filter.accepts_node(&info) {
            return Ok(Visit::Skip);
        }

        // Invisible containers can still hold visible children
        if !info.bounds.has_area() || !viewport.intersects(&info.bounds) {
            return Ok(Visit::Descend);
        }

        let aggregate = tree.text_within(id, self.text_limits())?;
        if aggregate.truncated {
            return Ok(Visit::Descend);
        }
        let aggregate = aggregate.text;
        let normalized = text::normalize(&aggregate);
        let fingerprint = text::fingerprint(&normalized);

        if let Some(matcher) = self.matchers.first_match(&info) {
            if self.filter.accepts_text(&aggregate) {
                if captured.contains(&fingerprint) {
                    return Ok(Visit::Skip);
                }
                return Ok(Visit::Capture(Candidate {
                    node: id,
                    text: text::clean(&aggregate),
                    fingerprint,
                    matched_by: Some(matcher.name),
                }));
            }
        }

        let aggregate_len = text::char_len(&normalized);
        if aggregate_len < self.config.min_aggregate_len || aggregate_len > self.config.max_aggregate_len {
            return Ok(Visit::Descend);
        }

        let own = text::clean(&tree.own_text(id)?);
        if text::char_len(&own) <= self.config.min_direct_len {
            return Ok(Visit::Descend);
        }

        if !self.filter.accepts_text(&aggregate) {
            return Ok(Visit::Descend);
        }

        // Same text already captured higher up or earlier in this pass
        if captured.contains(&fingerprint) {
            return Ok(Visit::Skip);
        }

        Ok(Visit::Capture(Candidate {
            node: id,
            text: text::clean(&aggregate),
            fingerprint,
            matched_by: None,
        }))
    }
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::with_config(ExtractionConfig::default(), FilterConfig::default())
    }
}
