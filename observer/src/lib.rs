//! Lazy element observation for virtualized trees.
//!
//! A host view (typically a file explorer) mounts rows lazily as the user
//! scrolls. [`LazyElementObserver`] registers every row matching a selector,
//! waits until the host reports it visible, and hands it to an
//! [`ElementProcessor`] exactly once until the row is explicitly marked for
//! reprocessing.
//!
//! The observer does not talk to a rendering engine itself. The host supplies
//! an [`ElementTree`] to query and an [`ObservationBackend`] to create the
//! visibility and mutation trackers, then feeds their notifications back
//! through [`LazyElementObserver::handle_mutations`] and
//! [`LazyElementObserver::handle_visibility`].

pub mod memory;
pub mod observer;
pub mod substrate;

pub use memory::{MemoryTree, NodeId, RecordingBackend, TrackerLog};
pub use observer::LazyElementObserver;
pub use substrate::{
    ElementProcessor, ElementTree, MutationRecord, MutationTracker, ObservationBackend,
    VisibilityEntry, VisibilityOptions, VisibilityTracker,
};

/// Selector of file rows in the explorer.
pub const DEFAULT_SELECTOR: &str = ".nav-file-title";

/// Look-ahead margin, in pixels, within which rows count as visible.
pub const DEFAULT_ROOT_MARGIN_PX: u32 = 100;
