//! Session-wide deduplication ledger.
//!
//! Records which nodes have been evaluated and which normalized texts have
//! been submitted. Entries are committed before a classification is
//! dispatched, so a failed or slow call never causes a resubmission.

use crate::annotator::Annotator;
use crate::text;
use crate::types::NodeId;
use std::collections::HashSet;
use tracing::{debug, info};

/// Outcome of checking a candidate against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupResult {
    /// Unseen; both node and fingerprint are now recorded
    New,
    /// The node was already evaluated this session
    KnownNode,
    /// Identical normalized text was already submitted from another node
    KnownFingerprint,
}

impl DedupResult {
    pub fn is_new(&self) -> bool {
        matches!(self, DedupResult::New)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStats {
    pub processed_nodes: usize,
    pub fingerprints: usize,
}

/// Processed node and fingerprint sets for one session
#[derive(Debug, Default)]
pub struct DedupLedger {
    nodes: HashSet<NodeId>,
    fingerprints: HashSet<u64>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a candidate and, if unseen, record it
    pub fn check(&mut self, node: NodeId, content: &str) -> DedupResult {
        if self.nodes.contains(&node) {
            return DedupResult::KnownNode;
        }

        let fingerprint = text::fingerprint_text(content);
        if self.fingerprints.contains(&fingerprint) {
            // A different container surfaced the same text; mark it seen too
            self.nodes.insert(node);
            debug!("Node {} duplicates fingerprint {:016x}", node, fingerprint);
            return DedupResult::KnownFingerprint;
        }

        self.nodes.insert(node);
        self.fingerprints.insert(fingerprint);
        DedupResult::New
    }

    /// Whether the candidate should be classified; records it when it should
    pub fn should_process(&mut self, node: NodeId, content: &str) -> bool {
        self.check(node, content).is_new()
    }

    pub fn is_processed(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Whether this exact normalized text was already submitted
    pub fn has_fingerprint(&self, fingerprint: u64) -> bool {
        self.fingerprints.contains(&fingerprint)
    }

    pub fn processed_node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            processed_nodes: self.nodes.len(),
            fingerprints: self.fingerprints.len(),
        }
    }

    /// Forget every node and fingerprint and remove every marker.
    ///
    /// The only way processed content becomes eligible again. Takes the
    /// annotator so the three collections can never be cleared separately.
    /// Returns the number of markers removed.
    pub fn clear(&mut self, annotator: &mut Annotator) -> usize {
        let nodes = self.nodes.len();
        let fingerprints = self.fingerprints.len();
        self.nodes.clear();
        self.fingerprints.clear();
        let markers = annotator.clear_all();
        info!(
            "Cleared {} nodes, {} fingerprints, {} markers",
            nodes, fingerprints, markers
        );
        markers
    }
}
