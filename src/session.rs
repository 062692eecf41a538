//! Per-session scan state.

use crate::annotator::Annotator;
use crate::ledger::DedupLedger;
use crate::types::{ClassificationResult, NodeId, RiskLevel};

/// Ledger and markers for one document session.
///
/// Kept together so that clearing can never leave them out of step.
pub struct ScanSession {
    pub ledger: DedupLedger,
    pub annotator: Annotator,
    /// Bumped by every clear; results from an older epoch are stale
    epoch: u64,
}

impl ScanSession {
    pub fn new(annotator: Annotator) -> Self {
        Self {
            ledger: DedupLedger::new(),
            annotator,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Check whether work committed at `epoch` still belongs to this session
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Forget all processed content and remove every marker
    pub fn clear(&mut self) -> usize {
        self.epoch += 1;
        self.ledger.clear(&mut self.annotator)
    }

    /// Attach a marker, logging host rejection. Returns whether it was placed.
    pub fn try_mark(&mut self, node: NodeId, result: &ClassificationResult, risk: RiskLevel) -> bool {
        match self.annotator.mark(node, result, risk) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Marker not placed: {}", e);
                false
            }
        }
    }
}
