//! Host document abstraction.
//!
//! The scanner never owns the document it scans. Hosts (a rendered page, a
//! mobile accessibility tree, the in-memory tree in [`memory`]) expose their
//! nodes through [`DocumentTree`] and report structural changes as
//! [`TreeEvent`]s.

pub mod memory;

use crate::text;
use crate::types::{ExtractionError, NodeBounds, NodeId, Viewport};
use std::collections::HashSet;

pub use memory::{MemoryTree, NodeSpec};

/// Maximum depth followed when assembling aggregate text
pub const MAX_TEXT_DEPTH: usize = 100;

/// Snapshot of the attributes the scanner reads from a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    /// Element kind, e.g. "div", "script", "AXStaticText"
    pub kind: String,
    /// Structural role, e.g. "article", "navigation"
    pub role: Option<String>,
    /// Class string as exposed by the host
    pub class_name: String,
    /// Element id as exposed by the host
    pub element_id: String,
    pub bounds: NodeBounds,
    /// Node was created by this engine (a marker badge or similar)
    pub is_annotation: bool,
}

impl NodeInfo {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: None,
            class_name: String::new(),
            element_id: String::new(),
            bounds: NodeBounds::default(),
            is_annotation: false,
        }
    }
}

/// Structural change notifications emitted by a host
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// Nodes were inserted; `annotation_only` when every one is an engine annotation
    Inserted { count: usize, annotation_only: bool },
    /// Nodes were removed
    Removed { count: usize },
    /// Attributes or text of an existing node changed
    AttributesChanged { node: NodeId },
    /// The viewport moved
    Scrolled { scroll_y: f64 },
}

/// Read access to a live host document.
///
/// Every per-node query may fail with [`ExtractionError::NodeGone`] because
/// the host can destroy nodes between calls.
pub trait DocumentTree: Send + Sync {
    /// Root of the document, if one is attached
    fn root(&self) -> Option<NodeId>;

    /// Attribute snapshot of a node
    fn node(&self, id: NodeId) -> Result<NodeInfo, ExtractionError>;

    /// Direct children in document order
    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, ExtractionError>;

    /// Text held directly by the node, excluding descendants
    fn own_text(&self, id: NodeId) -> Result<String, ExtractionError>;

    /// Currently visible band of the document
    fn viewport(&self) -> Viewport;

    /// Text of the node and all descendants, skipping engine annotations
    fn text_content(&self, id: NodeId) -> Result<String, ExtractionError> {
        Ok(self.text_within(id, TextLimits::UNBOUNDED)?.text)
    }

    /// Aggregate text, giving up once either limit is passed.
    ///
    /// Each node contributes at most once, so hosts that list a node under
    /// several parents (or under itself) still terminate.
    fn text_within(&self, id: NodeId, limits: TextLimits) -> Result<AggregateText, ExtractionError> {
        let mut collector = TextCollector::new(limits);
        collector.collect(self, id, 0)?;
        Ok(collector.finish())
    }
}

/// Bounds on an aggregate text walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    /// Characters of cleaned text
    pub max_chars: usize,
    pub max_nodes: usize,
}

impl TextLimits {
    pub const UNBOUNDED: TextLimits = TextLimits {
        max_chars: usize::MAX,
        max_nodes: usize::MAX,
    };
}

/// Result of [`DocumentTree::text_within`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateText {
    /// Own texts in document order, whitespace-collapsed and space-joined
    pub text: String,
    /// A limit was hit; `text` is a prefix of the full aggregate
    pub truncated: bool,
}

struct TextCollector {
    limits: TextLimits,
    out: String,
    chars: usize,
    truncated: bool,
    visited: HashSet<NodeId>,
}

impl TextCollector {
    fn new(limits: TextLimits) -> Self {
        Self {
            limits,
            out: String::new(),
            chars: 0,
            truncated: false,
            visited: HashSet::new(),
        }
    }

    fn collect<T: DocumentTree + ?Sized>(
        &mut self,
        tree: &T,
        id: NodeId,
        depth: usize,
    ) -> Result<(), ExtractionError> {
        if depth > MAX_TEXT_DEPTH {
            tracing::trace!("Text depth limit reached at {}", id);
            return Ok(());
        }
        if !self.visited.insert(id) {
            return Ok(());
        }
        if self.visited.len() > self.limits.max_nodes {
            self.truncated = true;
            return Ok(());
        }

        self.push(&tree.own_text(id)?);

        for child in tree.children(id)? {
            if self.truncated {
                break;
            }
            match tree.node(child) {
                Ok(info) if info.is_annotation => continue,
                Ok(_) => {}
                // Vanished children contribute nothing
                Err(_) => continue,
            }
            if self.collect(tree, child, depth + 1).is_err() {
                continue;
            }
        }

        Ok(())
    }

    fn push(&mut self, own: &str) {
        let own = text::clean(own);
        if own.is_empty() || self.truncated {
            return;
        }
        if !self.out.is_empty() {
            self.out.push(' ');
            self.chars += 1;
        }
        self.out.push_str(&own);
        self.chars += text::char_len(&own);

        if self.chars > self.limits.max_chars {
            self.out = self.out.chars().take(self.limits.max_chars).collect();
            self.chars = self.limits.max_chars;
            self.truncated = true;
        }
    }

    fn finish(self) -> AggregateText {
        AggregateText {
            text: self.out,
            truncated: self.truncated,
        }
    }
}
