//! Host-side observation primitives.

use std::fmt::Debug;
use std::hash::Hash;

/// Read access to the element tree being observed.
///
/// Elements are cheap handles (arena keys, node ids) that stay stable for the
/// lifetime of the element they name.
pub trait ElementTree {
    type Element: Clone + Eq + Hash + Debug;

    fn matches(&self, element: &Self::Element, selector: &str) -> bool;

    /// Descendants of `root` matching `selector`, in document order,
    /// excluding `root` itself.
    fn descendants_matching(&self, root: &Self::Element, selector: &str) -> Vec<Self::Element>;

    /// Whether the element is still attached to the live tree.
    fn is_connected(&self, element: &Self::Element) -> bool;
}

/// Visibility tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityOptions {
    /// Extra margin around the viewport so rows are decorated slightly
    /// before they scroll into view.
    pub root_margin_px: u32,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            root_margin_px: crate::DEFAULT_ROOT_MARGIN_PX,
        }
    }
}

/// Reports when observed elements enter or leave the viewport.
pub trait VisibilityTracker<E> {
    fn observe(&mut self, element: &E);
    fn unobserve(&mut self, element: &E);
    fn disconnect(&mut self);
}

/// Reports nodes added to or removed from a subtree.
pub trait MutationTracker<E> {
    fn observe_subtree(&mut self, root: &E);
    fn disconnect(&mut self);
}

/// Factory for fresh trackers.
pub trait ObservationBackend<E> {
    type Visibility: VisibilityTracker<E>;
    type Mutation: MutationTracker<E>;

    fn visibility_tracker(&mut self, options: VisibilityOptions) -> Self::Visibility;
    fn mutation_tracker(&mut self) -> Self::Mutation;
}

/// Computes the decoration of one element.
pub trait ElementProcessor<E> {
    fn process_element(&mut self, element: &E);
}

impl<E, F> ElementProcessor<E> for F
where
    F: FnMut(&E),
{
    fn process_element(&mut self, element: &E) {
        self(element);
    }
}

/// One batch of subtree changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord<E> {
    pub added: Vec<E>,
    pub removed: Vec<E>,
}

impl<E> MutationRecord<E> {
    pub fn added(nodes: Vec<E>) -> Self {
        Self {
            added: nodes,
            removed: Vec::new(),
        }
    }

    pub fn removed(nodes: Vec<E>) -> Self {
        Self {
            added: Vec::new(),
            removed: nodes,
        }
    }
}

/// Visibility change of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityEntry<E> {
    pub element: E,
    pub is_intersecting: bool,
}
