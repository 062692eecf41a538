//! Core types used throughout the content scanner.
//!
//! This module defines node identity and geometry, classification results,
//! scan triggers, and the error taxonomy shared by every stage of a pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque, non-owning handle to a node in the host document.
///
/// The token is assigned by the host and stays stable for as long as the node
/// lives. Holding a `NodeId` never keeps the node alive; queries against a
/// destroyed node fail with [`ExtractionError::NodeGone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Pack a slot index and generation counter into one token
    pub fn from_parts(slot: u32, generation: u32) -> Self {
        NodeId(((generation as u64) << 32) | slot as u64)
    }

    pub fn slot(&self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn generation(&self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot(), self.generation())
    }
}

/// On-screen rectangle of a node, in viewport-independent document coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the node occupies any screen area at all
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// The visible vertical band of the document.
///
/// `margin` extends the band above and below the viewport so content that is
/// about to scroll into view is scanned early.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_y: f64,
    pub height: f64,
    pub margin: f64,
}

impl Viewport {
    pub fn new(scroll_y: f64, height: f64) -> Self {
        Self {
            scroll_y,
            height,
            margin: 0.0,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Check whether a node's bounds intersect the visible band
    pub fn intersects(&self, bounds: &NodeBounds) -> bool {
        let top = self.scroll_y - self.margin;
        let bottom = self.scroll_y + self.height + self.margin;
        bounds.bottom() > top && bounds.y < bottom
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 1080.0)
    }
}

/// Risk level assigned by the classification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Caution,
    Danger,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Danger => "danger",
        }
    }

    /// Whether this level can ever lead to a marker
    pub fn is_actionable(&self) -> bool {
        !matches!(self, RiskLevel::Safe)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result returned by the classification service for one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub risk_level: RiskLevel,
    /// Confidence score (0.0-1.0)
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub detected_patterns: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Concrete steps the user should take, when the service provides them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<String>,
}

impl ClassificationResult {
    pub fn new(risk_level: RiskLevel, confidence: f64) -> Self {
        Self {
            risk_level,
            confidence,
            explanation: String::new(),
            detected_patterns: Vec::new(),
            recommendations: Vec::new(),
            action_items: Vec::new(),
        }
    }

    pub fn with_explanation(mut self, explanation: &str) -> Self {
        self.explanation = explanation.to_string();
        self
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.detected_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_recommendations(mut self, recommendations: &[&str]) -> Self {
        self.recommendations = recommendations.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_action_items(mut self, action_items: &[&str]) -> Self {
        self.action_items = action_items.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// A node proposed for classification in the current pass
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub node: NodeId,
    /// Whitespace-collapsed text as it will be sent to the service
    pub text: String,
    /// Fingerprint of the normalized text
    pub fingerprint: u64,
    /// Name of the structural matcher that harvested the node, if any
    pub matched_by: Option<&'static str>,
}

/// Annotation attached to a node after an actionable classification
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub node: NodeId,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub explanation: String,
    pub detected_patterns: Vec<String>,
    pub recommendations: Vec<String>,
    pub attached_at: DateTime<Utc>,
}

impl Marker {
    pub fn from_result(node: NodeId, result: &ClassificationResult, risk_level: RiskLevel) -> Self {
        Self {
            node,
            risk_level,
            confidence: result.confidence,
            explanation: result.explanation.clone(),
            detected_patterns: result.detected_patterns.clone(),
            recommendations: result.recommendations.clone(),
            attached_at: Utc::now(),
        }
    }
}

/// Events that can request a scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    /// Periodic timer fired while auto-scan is enabled
    TimerTick,
    /// Scrolling stopped for the debounce window
    ScrollSettled,
    /// Structural insertions stopped for the debounce window
    MutationSettled,
    /// Explicit request from a presentation layer
    OnDemand,
}

impl ScanTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTrigger::TimerTick => "timer",
            ScanTrigger::ScrollSettled => "scroll",
            ScanTrigger::MutationSettled => "mutation",
            ScanTrigger::OnDemand => "on-demand",
        }
    }

    /// Automatic triggers are suppressed while auto-scan is disabled
    pub fn is_automatic(&self) -> bool {
        !matches!(self, ScanTrigger::OnDemand)
    }
}

/// Errors raised while reading the host tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Node {0} no longer exists")]
    NodeGone(NodeId),

    #[error("Node {0} could not be read: {1}")]
    Unreadable(NodeId, String),
}

/// Errors raised by the classification client
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassificationError {
    /// Network or connectivity failure, including timeouts
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered with an empty or unparseable body
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Content rejected before it was sent
    #[error("Invalid content: {0}")]
    InvalidContent(String),
}

impl ClassificationError {
    pub fn timeout(after: Duration) -> Self {
        ClassificationError::Transport(format!("timed out after {}ms", after.as_millis()))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClassificationError::Transport(_))
    }

    /// Status and malformed-body failures share transport handling in a pass
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ClassificationError::Status { .. } | ClassificationError::Malformed(_)
        )
    }
}

/// Errors raised by the host when attaching or removing markers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    #[error("Cannot annotate node {0}: node no longer exists")]
    NodeGone(NodeId),

    #[error("Host rejected marker on node {0}: {1}")]
    Rejected(NodeId, String),
}
