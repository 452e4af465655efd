use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sidelight_core::annotation::Annotation;
use sidelight_core::ids::Tag;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// The sidebar's authoritative annotation collection.
///
/// Every mutation swaps the whole collection for a fresh `Arc`, so consumers
/// can use `Arc::ptr_eq` against a previously seen snapshot as a cheap
/// has-anything-changed check. Listeners run synchronously after each
/// mutation, on the mutating call stack.
pub struct AnnotationStore {
    annotations: RwLock<Arc<Vec<Annotation>>>,
    listeners: Mutex<Vec<Listener>>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            annotations: RwLock::new(Arc::new(Vec::new())),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Current snapshot. Identical `Arc` between calls means no change.
    pub fn annotations(&self) -> Arc<Vec<Annotation>> {
        Arc::clone(&self.annotations.read())
    }

    /// Register a change listener, invoked synchronously after every
    /// mutation.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Append annotations to the collection.
    pub fn add(&self, annotations: Vec<Annotation>) {
        if annotations.is_empty() {
            return;
        }
        let mut next = self.annotations.read().as_ref().clone();
        next.extend(annotations);
        self.replace(next);
    }

    /// Remove every annotation whose tag is in `tags`.
    pub fn remove(&self, tags: &[Tag]) {
        let current = self.annotations();
        let next: Vec<Annotation> = current
            .iter()
            .filter(|annotation| !tags.contains(&annotation.tag))
            .cloned()
            .collect();
        if next.len() == current.len() {
            return;
        }
        self.replace(next);
    }

    /// Update the anchor status of the annotation with the given tag.
    ///
    /// Keyed by tag rather than persistent id because anchoring callbacks
    /// can race with id assignment. Unknown tags are a silent no-op: late
    /// reports after a delete are expected, not errors.
    pub fn update_anchor_status(&self, tag: &Tag, orphan: bool) -> bool {
        let current = self.annotations();
        if !current.iter().any(|annotation| &annotation.tag == tag) {
            tracing::debug!(tag = %tag, "Anchor status for unknown tag, ignoring");
            return false;
        }
        let next: Vec<Annotation> = current
            .iter()
            .map(|annotation| {
                if &annotation.tag == tag {
                    let mut updated = annotation.clone();
                    updated.orphan = Some(orphan);
                    updated
                } else {
                    annotation.clone()
                }
            })
            .collect();
        self.replace(next);
        true
    }

    fn replace(&self, next: Vec<Annotation>) {
        *self.annotations.write() = Arc::new(next);
        self.notify();
    }

    fn notify(&self) {
        // Snapshot the listener list so a listener can subscribe or mutate
        // the store without deadlocking.
        let listeners: Vec<Listener> = self.listeners.lock().clone();
        for listener in listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn add_replaces_snapshot() {
        let store = AnnotationStore::new();
        let before = store.annotations();

        store.add(vec![Annotation::new("http://example.com")]);
        let after = store.annotations();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn snapshot_is_stable_without_mutation() {
        let store = AnnotationStore::new();
        store.add(vec![Annotation::new("http://example.com")]);

        let a = store.annotations();
        let b = store.annotations();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn remove_by_tag() {
        let store = AnnotationStore::new();
        let keep = Annotation::new("http://example.com/keep");
        let drop = Annotation::new("http://example.com/drop");
        let drop_tag = drop.tag.clone();
        store.add(vec![keep.clone(), drop]);

        store.remove(&[drop_tag]);
        let annotations = store.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].tag, keep.tag);
    }

    #[test]
    fn remove_unknown_tag_keeps_snapshot() {
        let store = AnnotationStore::new();
        store.add(vec![Annotation::new("http://example.com")]);

        let before = store.annotations();
        store.remove(&[Tag::from_raw("ann_unknown")]);
        assert!(Arc::ptr_eq(&before, &store.annotations()));
    }

    #[test]
    fn listeners_fire_on_every_mutation() {
        let store = AnnotationStore::new();
        let notifications = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&notifications);
        store.subscribe(move || {
            let _ = count.fetch_add(1, Ordering::SeqCst);
        });

        let annotation = Annotation::new("http://example.com");
        let tag = annotation.tag.clone();
        store.add(vec![annotation]);
        store.update_anchor_status(&tag, false);
        store.remove(&[tag]);

        assert_eq!(notifications.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn update_anchor_status_sets_orphan() {
        let store = AnnotationStore::new();
        let annotation = Annotation::new("http://example.com");
        let tag = annotation.tag.clone();
        store.add(vec![annotation]);

        assert!(store.update_anchor_status(&tag, true));
        assert_eq!(store.annotations()[0].orphan, Some(true));
    }

    #[test]
    fn update_anchor_status_unknown_tag_is_silent() {
        let store = AnnotationStore::new();
        store.add(vec![Annotation::new("http://example.com")]);
        let before = store.annotations();

        assert!(!store.update_anchor_status(&Tag::from_raw("ann_gone"), true));
        // No snapshot swap, no spurious notification round.
        assert!(Arc::ptr_eq(&before, &store.annotations()));
    }

    #[test]
    fn listener_can_read_store_reentrantly() {
        let store = Arc::new(AnnotationStore::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&store);
        let lengths = Arc::clone(&seen);
        store.subscribe(move || {
            let _ = lengths.fetch_add(inner.annotations().len(), Ordering::SeqCst);
        });

        store.add(vec![Annotation::new("http://example.com")]);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
