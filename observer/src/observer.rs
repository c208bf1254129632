//! Once-per-element processing driven by visibility.

use std::collections::HashSet;

use crate::DEFAULT_SELECTOR;
use crate::substrate::{
    ElementProcessor, ElementTree, MutationRecord, MutationTracker, ObservationBackend,
    VisibilityEntry, VisibilityOptions, VisibilityTracker,
};

/// Decorates matching elements of a lazily populated container.
///
/// Each element moves through `unobserved -> observed -> processed`.
/// Elements become observed when they match the selector, either at setup or
/// when a mutation batch adds them. An observed element is processed the
/// first time it is reported visible. [`Self::mark_element_for_reprocessing`]
/// sends a processed element back to observed so its next visibility report
/// runs the processor again.
pub struct LazyElementObserver<E, B, P>
where
    B: ObservationBackend<E>,
{
    backend: B,
    processor: P,
    selector: String,
    options: VisibilityOptions,
    visibility: Option<B::Visibility>,
    mutation: Option<B::Mutation>,
    observed: HashSet<E>,
    processed: HashSet<E>,
}

impl<E, B, P> LazyElementObserver<E, B, P>
where
    E: Clone + Eq + std::hash::Hash + std::fmt::Debug,
    B: ObservationBackend<E>,
    P: ElementProcessor<E>,
{
    pub fn new(backend: B, processor: P) -> Self {
        Self {
            backend,
            processor,
            selector: DEFAULT_SELECTOR.to_string(),
            options: VisibilityOptions::default(),
            visibility: None,
            mutation: None,
            observed: HashSet::new(),
            processed: HashSet::new(),
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_options(mut self, options: VisibilityOptions) -> Self {
        self.options = options;
        self
    }

    /// Start observing `container`, replacing any previous observation.
    ///
    /// Elements already present are registered immediately so content
    /// rendered before setup is not missed.
    pub fn setup_observers<T>(&mut self, tree: &T, container: &E)
    where
        T: ElementTree<Element = E>,
    {
        self.cleanup();

        self.visibility = Some(self.backend.visibility_tracker(self.options));
        let mut mutation = self.backend.mutation_tracker();
        mutation.observe_subtree(container);
        self.mutation = Some(mutation);

        if tree.matches(container, &self.selector) {
            self.observe(container.clone());
        }
        for element in tree.descendants_matching(container, &self.selector) {
            self.observe(element);
        }
        tracing::debug!(
            observed = self.observed.len(),
            selector = %self.selector,
            "element observers set up"
        );
    }

    /// Register added nodes (and their matching descendants) and forget
    /// removed ones.
    pub fn handle_mutations<T>(&mut self, tree: &T, records: &[MutationRecord<E>])
    where
        T: ElementTree<Element = E>,
    {
        if !self.is_active() {
            return;
        }
        for record in records {
            for node in &record.added {
                if tree.matches(node, &self.selector) {
                    self.observe(node.clone());
                }
                for element in tree.descendants_matching(node, &self.selector) {
                    self.observe(element);
                }
            }
            for node in &record.removed {
                self.forget(node);
                for element in tree.descendants_matching(node, &self.selector) {
                    self.forget(&element);
                }
            }
        }
    }

    /// Process every observed, unprocessed element that became visible.
    /// Returns how many elements were processed.
    pub fn handle_visibility(&mut self, entries: &[VisibilityEntry<E>]) -> usize {
        if !self.is_active() {
            return 0;
        }
        let mut count = 0;
        for entry in entries {
            if !entry.is_intersecting || !self.observed.contains(&entry.element) {
                continue;
            }
            if self.processed.insert(entry.element.clone()) {
                self.processor.process_element(&entry.element);
                count += 1;
            }
        }
        count
    }

    /// Clear the processed mark so the next visibility report runs the
    /// processor again. Does not run it by itself.
    pub fn mark_element_for_reprocessing(&mut self, element: &E) {
        self.processed.remove(element);
    }

    /// Run the processor now for an observed element, regardless of its
    /// processed mark. Returns false for elements that are not observed.
    pub fn process_now(&mut self, element: &E) -> bool {
        if !self.observed.contains(element) {
            return false;
        }
        self.processed.insert(element.clone());
        self.processor.process_element(element);
        true
    }

    /// Drop handles of elements no longer attached to the live tree.
    /// Returns how many were dropped.
    pub fn sweep<T>(&mut self, tree: &T) -> usize
    where
        T: ElementTree<Element = E>,
    {
        let stale: Vec<E> = self
            .observed
            .iter()
            .filter(|element| !tree.is_connected(element))
            .cloned()
            .collect();
        for element in &stale {
            self.forget(element);
        }
        stale.len()
    }

    /// Disconnect both trackers and forget every element.
    pub fn cleanup(&mut self) {
        if let Some(mut visibility) = self.visibility.take() {
            visibility.disconnect();
        }
        if let Some(mut mutation) = self.mutation.take() {
            mutation.disconnect();
        }
        self.observed.clear();
        self.processed.clear();
    }

    /// Whether observers are currently set up.
    pub fn is_active(&self) -> bool {
        self.visibility.is_some()
    }

    pub fn is_observed(&self, element: &E) -> bool {
        self.observed.contains(element)
    }

    pub fn is_processed(&self, element: &E) -> bool {
        self.processed.contains(element)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    fn observe(&mut self, element: E) {
        if self.observed.contains(&element) {
            return;
        }
        if let Some(visibility) = self.visibility.as_mut() {
            visibility.observe(&element);
        }
        self.observed.insert(element);
    }

    fn forget(&mut self, element: &E) {
        if self.observed.remove(element)
            && let Some(visibility) = self.visibility.as_mut()
        {
            visibility.unobserve(element);
        }
        self.processed.remove(element);
    }
}

impl<E, B, P> Drop for LazyElementObserver<E, B, P>
where
    B: ObservationBackend<E>,
{
    fn drop(&mut self) {
        if let Some(mut visibility) = self.visibility.take() {
            visibility.disconnect();
        }
        if let Some(mut mutation) = self.mutation.take() {
            mutation.disconnect();
        }
    }
}
