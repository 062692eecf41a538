//! In-memory host document.
//!
//! A generation-tagged arena standing in for a rendered page. Slots are
//! reused after removal with a bumped generation, so a `NodeId` held by the
//! scanner never aliases a node created later in the same slot. Markers are
//! rendered as annotation child nodes, the same way a page would insert a
//! badge element next to flagged content.

use super::{DocumentTree, NodeInfo, TreeEvent};
use crate::annotator::MarkerSurface;
use crate::types::{AnnotationError, ExtractionError, Marker, NodeBounds, NodeId, RiskLevel, Viewport};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

/// Kind used for marker badge nodes
pub const MARKER_KIND: &str = "scanner-marker";

/// Builder describing a node to insert
#[derive(Debug, Clone)]
pub struct NodeSpec {
    info: NodeInfo,
    text: String,
}

impl NodeSpec {
    pub fn new(kind: &str) -> Self {
        let mut info = NodeInfo::new(kind);
        info.bounds = NodeBounds::new(0.0, 0.0, 800.0, 40.0);
        Self {
            info,
            text: String::new(),
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.info.role = Some(role.to_string());
        self
    }

    pub fn class(mut self, class_name: &str) -> Self {
        self.info.class_name = class_name.to_string();
        self
    }

    pub fn id(mut self, element_id: &str) -> Self {
        self.info.element_id = element_id.to_string();
        self
    }

    pub fn bounds(mut self, bounds: NodeBounds) -> Self {
        self.info.bounds = bounds;
        self
    }

    /// Position the node vertically, keeping the default width and height
    pub fn at_y(mut self, y: f64) -> Self {
        self.info.bounds.y = y;
        self
    }

    pub fn annotation(mut self) -> Self {
        self.info.is_annotation = true;
        self
    }
}

#[derive(Debug)]
struct MemoryNode {
    info: NodeInfo,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<MemoryNode>,
}

#[derive(Debug)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<NodeId>,
    viewport: Viewport,
    /// Content node -> its marker badge node and level
    markers: HashMap<NodeId, (NodeId, RiskLevel)>,
}

impl Arena {
    fn get(&self, id: NodeId) -> Option<&MemoryNode> {
        self.slots
            .get(id.slot() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut MemoryNode> {
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    fn allocate(&mut self, node: MemoryNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId::from_parts(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::from_parts(index, 0)
        }
    }

    fn insert(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId, ExtractionError> {
        if self.get(parent).is_none() {
            return Err(ExtractionError::NodeGone(parent));
        }
        let id = self.allocate(MemoryNode {
            info: spec.info,
            text: spec.text,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    /// Remove a node and its subtree, returning how many nodes were freed
    fn remove_subtree(&mut self, id: NodeId) -> usize {
        let parent = match self.get(id) {
            Some(node) => node.parent,
            None => return 0,
        };
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|child| *child != id);
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.slot() as usize];
            if slot.generation != current.generation() {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.slot());
                self.markers.remove(&current);
                removed += 1;
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        removed
    }
}

/// Thread-safe in-memory document tree
pub struct MemoryTree {
    arena: RwLock<Arena>,
    events: Mutex<Option<mpsc::Sender<TreeEvent>>>,
}

impl MemoryTree {
    /// Create a tree holding a single `body` root
    pub fn new() -> Self {
        let mut arena = Arena {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            viewport: Viewport::default(),
            markers: HashMap::new(),
        };
        let mut info = NodeInfo::new("body");
        info.bounds = NodeBounds::new(0.0, 0.0, 1280.0, 100_000.0);
        let root = arena.allocate(MemoryNode {
            info,
            text: String::new(),
            parent: None,
            children: Vec::new(),
        });
        arena.root = Some(root);

        Self {
            arena: RwLock::new(arena),
            events: Mutex::new(None),
        }
    }

    /// Subscribe to structural change events (replaces any prior subscriber)
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<TreeEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        if let Ok(mut events) = self.events.lock() {
            *events = Some(tx);
        }
        rx
    }

    fn emit(&self, event: TreeEvent) {
        let Ok(events) = self.events.lock() else {
            return;
        };
        if let Some(tx) = events.as_ref() {
            if tx.try_send(event).is_err() {
                trace!("Tree event dropped (subscriber full or closed)");
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a node under `parent`
    pub fn append(&self, parent: NodeId, spec: NodeSpec) -> Result<NodeId, ExtractionError> {
        let annotation_only = spec.info.is_annotation;
        let id = self.write().insert(parent, spec)?;
        self.emit(TreeEvent::Inserted {
            count: 1,
            annotation_only,
        });
        Ok(id)
    }

    /// Remove a node together with its subtree
    pub fn remove(&self, id: NodeId) -> Result<(), ExtractionError> {
        let removed = self.write().remove_subtree(id);
        if removed == 0 {
            return Err(ExtractionError::NodeGone(id));
        }
        self.emit(TreeEvent::Removed { count: removed });
        Ok(())
    }

    /// Replace the direct text of a node
    pub fn set_text(&self, id: NodeId, text: &str) -> Result<(), ExtractionError> {
        {
            let mut arena = self.write();
            let node = arena.get_mut(id).ok_or(ExtractionError::NodeGone(id))?;
            node.text = text.to_string();
        }
        self.emit(TreeEvent::AttributesChanged { node: id });
        Ok(())
    }

    /// Move the viewport
    pub fn scroll_to(&self, scroll_y: f64) {
        self.write().viewport.scroll_y = scroll_y;
        self.emit(TreeEvent::Scrolled { scroll_y });
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.write().viewport = viewport;
    }

    /// Whether a node is still alive
    pub fn contains(&self, id: NodeId) -> bool {
        self.read().get(id).is_some()
    }

    /// Risk level of the marker currently attached to a node
    pub fn marker_on(&self, id: NodeId) -> Option<RiskLevel> {
        self.read().markers.get(&id).map(|(_, level)| *level)
    }

    /// Number of marker badges currently in the document
    pub fn marker_count(&self) -> usize {
        self.read().markers.len()
    }

    /// Number of live nodes, badges included
    pub fn len(&self) -> usize {
        self.read().slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree for MemoryTree {
    fn root(&self) -> Option<NodeId> {
        self.read().root
    }

    fn node(&self, id: NodeId) -> Result<NodeInfo, ExtractionError> {
        self.read()
            .get(id)
            .map(|node| node.info.clone())
            .ok_or(ExtractionError::NodeGone(id))
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, ExtractionError> {
        self.read()
            .get(id)
            .map(|node| node.children.clone())
            .ok_or(ExtractionError::NodeGone(id))
    }

    fn own_text(&self, id: NodeId) -> Result<String, ExtractionError> {
        self.read()
            .get(id)
            .map(|node| node.text.clone())
            .ok_or(ExtractionError::NodeGone(id))
    }

    fn viewport(&self) -> Viewport {
        self.read().viewport
    }
}

impl MarkerSurface for MemoryTree {
    fn attach_marker(&self, marker: &Marker) -> Result<(), AnnotationError> {
        {
            let mut arena = self.write();
            let bounds = arena
                .get(marker.node)
                .map(|node| node.info.bounds)
                .ok_or(AnnotationError::NodeGone(marker.node))?;

            // At most one badge per node
            if let Some((badge, _)) = arena.markers.remove(&marker.node) {
                arena.remove_subtree(badge);
            }

            let badge = NodeSpec::new(MARKER_KIND)
                .text(&format!("[{}]", marker.risk_level))
                .bounds(NodeBounds::new(bounds.x, bounds.y, 24.0, 24.0))
                .annotation();
            let badge_id = arena
                .insert(marker.node, badge)
                .map_err(|_| AnnotationError::NodeGone(marker.node))?;
            arena.markers.insert(marker.node, (badge_id, marker.risk_level));
        }
        self.emit(TreeEvent::Inserted {
            count: 1,
            annotation_only: true,
        });
        Ok(())
    }

    fn remove_marker(&self, node: NodeId) -> Result<(), AnnotationError> {
        let mut arena = self.write();
        match arena.markers.remove(&node) {
            Some((badge, _)) => {
                arena.remove_subtree(badge);
                Ok(())
            }
            None if arena.get(node).is_none() => Err(AnnotationError::NodeGone(node)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TextLimits;
    use crate::types::ClassificationResult;

    fn marker(node: NodeId, level: RiskLevel) -> Marker {
        Marker::from_result(node, &ClassificationResult::new(level, 0.9), level)
    }

    #[test]
    fn test_append_and_read() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let div = tree
            .append(root, NodeSpec::new("div").class("post").text("Hello there"))
            .unwrap();

        assert_eq!(tree.children(root).unwrap(), vec![div]);
        assert_eq!(tree.node(div).unwrap().class_name, "post");
        assert_eq!(tree.own_text(div).unwrap(), "Hello there");
    }

    #[test]
    fn test_text_content_aggregates_descendants() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let div = tree.append(root, NodeSpec::new("div").text("Outer")).unwrap();
        let p = tree.append(div, NodeSpec::new("p").text("  inner text ")).unwrap();
        tree.append(p, NodeSpec::new("span").text("deep")).unwrap();

        assert_eq!(tree.text_content(div).unwrap(), "Outer inner text deep");
    }

    #[test]
    fn test_text_within_stops_at_limits() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let div = tree.append(root, NodeSpec::new("div").text("alpha  beta")).unwrap();
        tree.append(div, NodeSpec::new("p").text("gamma delta")).unwrap();
        tree.append(div, NodeSpec::new("p").text("epsilon")).unwrap();

        let full = tree.text_within(div, TextLimits::UNBOUNDED).unwrap();
        assert_eq!(full.text, "alpha beta gamma delta epsilon");
        assert!(!full.truncated);

        let short = tree
            .text_within(div, TextLimits { max_chars: 16, max_nodes: 10 })
            .unwrap();
        assert_eq!(short.text, "alpha beta gamma");
        assert!(short.truncated);

        let few = tree
            .text_within(div, TextLimits { max_chars: 100, max_nodes: 2 })
            .unwrap();
        assert_eq!(few.text, "alpha beta gamma delta");
        assert!(few.truncated);
    }

    #[test]
    fn test_removed_slot_gets_new_generation() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let first = tree.append(root, NodeSpec::new("p").text("one")).unwrap();
        tree.remove(first).unwrap();

        assert!(matches!(tree.node(first), Err(ExtractionError::NodeGone(_))));

        let second = tree.append(root, NodeSpec::new("p").text("two")).unwrap();
        assert_eq!(first.slot(), second.slot());
        assert_ne!(first, second);
        assert!(tree.own_text(first).is_err());
        assert_eq!(tree.own_text(second).unwrap(), "two");
    }

    #[test]
    fn test_remove_subtree_frees_descendants() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let div = tree.append(root, NodeSpec::new("div")).unwrap();
        let child = tree.append(div, NodeSpec::new("p")).unwrap();

        tree.remove(div).unwrap();
        assert!(!tree.contains(child));
        assert_eq!(tree.len(), 1);
        assert!(tree.remove(div).is_err());
    }

    #[test]
    fn test_marker_replaces_previous_badge() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let p = tree.append(root, NodeSpec::new("p").text("Some content")).unwrap();

        tree.attach_marker(&marker(p, RiskLevel::Caution)).unwrap();
        tree.attach_marker(&marker(p, RiskLevel::Danger)).unwrap();

        assert_eq!(tree.marker_on(p), Some(RiskLevel::Danger));
        assert_eq!(tree.marker_count(), 1);
        assert_eq!(tree.children(p).unwrap().len(), 1);
        // Badge text never leaks into aggregate text
        assert_eq!(tree.text_content(p).unwrap(), "Some content");

        tree.remove_marker(p).unwrap();
        assert_eq!(tree.marker_on(p), None);
        assert!(tree.children(p).unwrap().is_empty());
    }

    #[test]
    fn test_marker_on_destroyed_node_is_rejected() {
        let tree = MemoryTree::new();
        let root = tree.root().unwrap();
        let p = tree.append(root, NodeSpec::new("p")).unwrap();
        tree.remove(p).unwrap();

        assert_eq!(
            tree.attach_marker(&marker(p, RiskLevel::Danger)),
            Err(AnnotationError::NodeGone(p))
        );
    }

    #[tokio::test]
    async fn test_events_flag_annotation_insertions() {
        let tree = MemoryTree::new();
        let mut events = tree.subscribe(16);
        let root = tree.root().unwrap();
        let p = tree.append(root, NodeSpec::new("p").text("x")).unwrap();
        tree.attach_marker(&marker(p, RiskLevel::Danger)).unwrap();
        tree.scroll_to(500.0);

        assert_eq!(
            events.recv().await,
            Some(TreeEvent::Inserted { count: 1, annotation_only: false })
        );
        assert_eq!(
            events.recv().await,
            Some(TreeEvent::Inserted { count: 1, annotation_only: true })
        );
        assert_eq!(events.recv().await, Some(TreeEvent::Scrolled { scroll_y: 500.0 }));
        assert_eq!(tree.viewport().scroll_y, 500.0);
    }
}
