//! Markers and alerts.
//!
//! The annotator owns the session's marker bookkeeping and drives two host
//! capabilities: a [`MarkerSurface`] that renders markers next to nodes and
//! an [`AlertSink`] for high-priority notifications and speech.

use crate::types::{AnnotationError, ClassificationResult, Marker, NodeId, RiskLevel};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host capability for rendering markers
pub trait MarkerSurface: Send + Sync {
    /// Attach a marker to its node, replacing any marker already rendered there
    fn attach_marker(&self, marker: &Marker) -> Result<(), AnnotationError>;

    /// Remove the marker rendered on a node, if any
    fn remove_marker(&self, node: NodeId) -> Result<(), AnnotationError>;
}

/// High-priority notification for a dangerous classification
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Node the alert refers to; `None` for on-demand text analysis
    pub node: Option<NodeId>,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn from_result(node: Option<NodeId>, result: &ClassificationResult) -> Self {
        let message = if result.explanation.is_empty() {
            "This content shows signs of a scam or misinformation.".to_string()
        } else {
            result.explanation.clone()
        };

        Self {
            node,
            risk_level: result.risk_level,
            confidence: result.confidence,
            title: "Dangerous content detected".to_string(),
            message,
            raised_at: Utc::now(),
        }
    }

    /// Text spoken when voice alerts are enabled
    pub fn utterance(&self) -> String {
        format!("Warning. {} {}", self.title, self.message)
    }
}

/// Host capability for notifications and speech output
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &Alert);

    fn speak(&self, utterance: &str);
}

/// Alert sink that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn notify(&self, alert: &Alert) {
        warn!(
            "ALERT {} ({:.0}%): {}",
            alert.title,
            alert.confidence * 100.0,
            alert.message
        );
    }

    fn speak(&self, utterance: &str) {
        info!("Speech: {}", utterance);
    }
}

/// Session marker bookkeeping plus alert dispatch
pub struct Annotator {
    surface: Arc<dyn MarkerSurface>,
    alerts: Arc<dyn AlertSink>,
    voice_alerts_enabled: bool,
    markers: HashMap<NodeId, Marker>,
}

impl Annotator {
    pub fn new(surface: Arc<dyn MarkerSurface>, alerts: Arc<dyn AlertSink>, voice_alerts_enabled: bool) -> Self {
        Self {
            surface,
            alerts,
            voice_alerts_enabled,
            markers: HashMap::new(),
        }
    }

    /// Place a marker on a node, replacing any existing one.
    ///
    /// On host rejection the node is left without a marker.
    pub fn mark(
        &mut self,
        node: NodeId,
        result: &ClassificationResult,
        risk: RiskLevel,
    ) -> Result<(), AnnotationError> {
        if self.markers.remove(&node).is_some() {
            if let Err(e) = self.surface.remove_marker(node) {
                debug!("Removing previous marker failed: {}", e);
            }
        }

        let marker = Marker::from_result(node, result, risk);
        self.surface.attach_marker(&marker)?;
        debug!("Marked {} as {}", node, risk);
        self.markers.insert(node, marker);
        Ok(())
    }

    /// Remove every marker, returning how many were recorded.
    ///
    /// Called only through [`crate::ledger::DedupLedger::clear`].
    pub(crate) fn clear_all(&mut self) -> usize {
        let count = self.markers.len();
        for (node, _) in self.markers.drain() {
            // Destroyed nodes took their markers with them
            if let Err(e) = self.surface.remove_marker(node) {
                debug!("Marker removal on {} skipped: {}", node, e);
            }
        }
        count
    }

    /// Notify the user of a dangerous classification (plus speech when enabled)
    pub fn raise_alert(&self, node: Option<NodeId>, result: &ClassificationResult) -> Alert {
        let alert = Alert::from_result(node, result);
        self.alerts.notify(&alert);
        if self.voice_alerts_enabled {
            self.alerts.speak(&alert.utterance());
        }
        alert
    }

    pub fn set_voice_alerts(&mut self, enabled: bool) {
        self.voice_alerts_enabled = enabled;
    }

    pub fn voice_alerts_enabled(&self) -> bool {
        self.voice_alerts_enabled
    }

    pub fn marker_on(&self, node: NodeId) -> Option<&Marker> {
        self.markers.get(&node)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{DocumentTree, MemoryTree, NodeSpec};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        alerts: Mutex<Vec<Alert>>,
        spoken: Mutex<Vec<String>>,
    }

    impl AlertSink for RecordingSink {
        fn notify(&self, alert: &Alert) {
            self.alerts.lock().unwrap().push(alert.clone());
        }

        fn speak(&self, utterance: &str) {
            self.spoken.lock().unwrap().push(utterance.to_string());
        }
    }

    struct RejectingSurface;

    impl MarkerSurface for RejectingSurface {
        fn attach_marker(&self, marker: &Marker) -> Result<(), AnnotationError> {
            Err(AnnotationError::Rejected(marker.node, "read-only page".to_string()))
        }

        fn remove_marker(&self, _node: NodeId) -> Result<(), AnnotationError> {
            Ok(())
        }
    }

    fn setup(voice: bool) -> (Arc<MemoryTree>, Arc<RecordingSink>, Annotator) {
        let tree = Arc::new(MemoryTree::new());
        let sink = Arc::new(RecordingSink::default());
        let annotator = Annotator::new(tree.clone(), sink.clone(), voice);
        (tree, sink, annotator)
    }

    #[test]
    fn test_mark_replaces_existing_marker() {
        let (tree, _, mut annotator) = setup(false);
        let p = tree.append(tree.root().unwrap(), NodeSpec::new("p")).unwrap();

        let caution = ClassificationResult::new(RiskLevel::Caution, 0.4);
        let danger = ClassificationResult::new(RiskLevel::Danger, 0.9);
        annotator.mark(p, &caution, RiskLevel::Caution).unwrap();
        annotator.mark(p, &danger, RiskLevel::Danger).unwrap();

        assert_eq!(annotator.marker_count(), 1);
        assert_eq!(annotator.marker_on(p).map(|m| m.risk_level), Some(RiskLevel::Danger));
        assert_eq!(tree.marker_count(), 1);
        assert_eq!(tree.marker_on(p), Some(RiskLevel::Danger));
    }

    #[test]
    fn test_rejected_marker_not_recorded() {
        let sink = Arc::new(RecordingSink::default());
        let mut annotator = Annotator::new(Arc::new(RejectingSurface), sink, false);
        let result = ClassificationResult::new(RiskLevel::Danger, 0.9);

        let err = annotator.mark(NodeId(3), &result, RiskLevel::Danger).unwrap_err();
        assert!(matches!(err, AnnotationError::Rejected(NodeId(3), _)));
        assert_eq!(annotator.marker_count(), 0);
    }

    #[test]
    fn test_clear_all_tolerates_destroyed_nodes() {
        let (tree, _, mut annotator) = setup(false);
        let root = tree.root().unwrap();
        let a = tree.append(root, NodeSpec::new("p")).unwrap();
        let b = tree.append(root, NodeSpec::new("p")).unwrap();
        let result = ClassificationResult::new(RiskLevel::Caution, 0.7);
        annotator.mark(a, &result, RiskLevel::Caution).unwrap();
        annotator.mark(b, &result, RiskLevel::Caution).unwrap();
        tree.remove(a).unwrap();

        assert_eq!(annotator.clear_all(), 2);
        assert_eq!(annotator.marker_count(), 0);
        assert_eq!(tree.marker_count(), 0);
    }

    #[test]
    fn test_alert_without_voice() {
        let (_, sink, annotator) = setup(false);
        let result = ClassificationResult::new(RiskLevel::Danger, 0.82).with_explanation("Fake lottery");
        let alert = annotator.raise_alert(Some(NodeId(1)), &result);

        assert_eq!(alert.message, "Fake lottery");
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
        assert!(sink.spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn test_alert_with_voice() {
        let (_, sink, mut annotator) = setup(false);
        annotator.set_voice_alerts(true);
        let result = ClassificationResult::new(RiskLevel::Danger, 0.9);
        annotator.raise_alert(None, &result);

        let spoken = sink.spoken.lock().unwrap();
        assert_eq!(spoken.len(), 1);
        assert!(spoken[0].starts_with("Warning. Dangerous content detected"));
    }
}
