//! In-memory element tree and recording trackers.
//!
//! Enough of a DOM to drive [`crate::LazyElementObserver`] without a
//! rendering engine: headless hosts use it to model their file tree, and the
//! tests use it to script mount/scroll/unmount sequences.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::substrate::{
    ElementTree, MutationTracker, ObservationBackend, VisibilityOptions, VisibilityTracker,
};

/// Arena key of a [`MemoryTree`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Default)]
struct Node {
    classes: Vec<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed tree. Node 0 is the document root and is always connected.
///
/// Selectors are single class names written as `.name`. Ids from another
/// tree are treated as unknown nodes: lookups come back empty and edits are
/// ignored.
#[derive(Debug)]
pub struct MemoryTree {
    nodes: Vec<Node>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Create a detached node with the given classes.
    pub fn create(&mut self, classes: &[&str]) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            classes: classes.iter().map(ToString::to_string).collect(),
            ..Node::default()
        });
        id
    }

    /// Attach `child` as the last child of `parent`, detaching it first.
    ///
    /// Returns `false` without touching the tree when either node is unknown,
    /// when `child` is the root, or when `parent` sits inside `child`'s
    /// subtree.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent)
            || !self.contains(child)
            || child == self.root()
            || self.is_within(parent, child)
        {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
        true
    }

    /// Create a node and attach it in one step. The node stays detached
    /// when `parent` is unknown.
    pub fn append_new(&mut self, parent: NodeId, classes: &[&str]) -> NodeId {
        let id = self.create(classes);
        self.append(parent, id);
        id
    }

    /// Detach `node` (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(node.0).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.retain(|child| *child != node);
        }
    }

    /// Children of `node`, empty for unknown ids.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    fn walk(&self, root: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(root) {
            out.push(*child);
            self.walk(*child, out);
        }
    }
}

impl ElementTree for MemoryTree {
    type Element = NodeId;

    fn matches(&self, element: &NodeId, selector: &str) -> bool {
        let Some(class) = selector.strip_prefix('.') else {
            return false;
        };
        self.nodes
            .get(element.0)
            .is_some_and(|node| node.classes.iter().any(|c| c == class))
    }

    fn descendants_matching(&self, root: &NodeId, selector: &str) -> Vec<NodeId> {
        let mut all = Vec::new();
        self.walk(*root, &mut all);
        all.retain(|node| self.matches(node, selector));
        all
    }

    fn is_connected(&self, element: &NodeId) -> bool {
        let mut current = *element;
        loop {
            if current == self.root() {
                return true;
            }
            match self.nodes.get(current.0).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

/// What the recording trackers were asked to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackerLog {
    /// Elements currently registered with a live visibility tracker.
    pub visible_targets: BTreeSet<NodeId>,
    /// Roots currently watched by a live mutation tracker.
    pub mutation_roots: BTreeSet<NodeId>,
    /// Options of every visibility tracker created so far.
    pub created: Vec<VisibilityOptions>,
    pub disconnects: usize,
}

/// Backend whose trackers only record calls into a shared [`TrackerLog`].
/// Visibility and mutation notifications are delivered by hand.
#[derive(Debug, Default, Clone)]
pub struct RecordingBackend {
    log: Rc<RefCell<TrackerLog>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> TrackerLog {
        self.log.borrow().clone()
    }
}

#[derive(Debug)]
pub struct RecordingVisibility {
    log: Rc<RefCell<TrackerLog>>,
}

#[derive(Debug)]
pub struct RecordingMutation {
    log: Rc<RefCell<TrackerLog>>,
}

impl VisibilityTracker<NodeId> for RecordingVisibility {
    fn observe(&mut self, element: &NodeId) {
        self.log.borrow_mut().visible_targets.insert(*element);
    }

    fn unobserve(&mut self, element: &NodeId) {
        self.log.borrow_mut().visible_targets.remove(element);
    }

    fn disconnect(&mut self) {
        let mut log = self.log.borrow_mut();
        log.visible_targets.clear();
        log.disconnects += 1;
    }
}

impl MutationTracker<NodeId> for RecordingMutation {
    fn observe_subtree(&mut self, root: &NodeId) {
        self.log.borrow_mut().mutation_roots.insert(*root);
    }

    fn disconnect(&mut self) {
        let mut log = self.log.borrow_mut();
        log.mutation_roots.clear();
        log.disconnects += 1;
    }
}

impl ObservationBackend<NodeId> for RecordingBackend {
    type Visibility = RecordingVisibility;
    type Mutation = RecordingMutation;

    fn visibility_tracker(&mut self, options: VisibilityOptions) -> RecordingVisibility {
        self.log.borrow_mut().created.push(options);
        RecordingVisibility {
            log: Rc::clone(&self.log),
        }
    }

    fn mutation_tracker(&mut self) -> RecordingMutation {
        RecordingMutation {
            log: Rc::clone(&self.log),
        }
    }
}
