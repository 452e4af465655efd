//! Keeps the annotations rendered in connected frames in sync with the
//! sidebar's store.
//!
//! One reconciliation round runs to completion per store change: a
//! reference-equality fast path skips unchanged snapshots, replies are
//! filtered out, new annotations go out as a single batched
//! `loadAnnotations` call and removed ones as individual `deleteAnnotation`
//! calls. Delivery is at-most-once; a missed call heals on the next round.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use sidelight_bridge::{Bridge, Channel};
use sidelight_core::annotation::{is_reply, Annotation};
use sidelight_core::events::SidebarEvent;
use sidelight_core::ids::Tag;
use sidelight_core::wire::{CreateEvent, DocumentInfoReply, SyncEntry, WireAnnotation};
use sidelight_store::{AnnotationStore, FrameInfo, FrameRegistry};

use crate::discovery::Discovery;

/// The sidebar-side sync engine.
///
/// Collaborators are injected so independent instances can run side by side
/// in tests; the in-page tag set and previous-snapshot reference are
/// exclusive instance state, never shared or persisted.
pub struct FrameSync {
    store: Arc<AnnotationStore>,
    frame_registry: Arc<FrameRegistry>,
    bridge: Arc<Bridge>,
    event_tx: broadcast::Sender<SidebarEvent>,
    /// Tags believed to be rendered in at least one frame.
    in_page: Mutex<HashSet<Tag>>,
    /// Last store snapshot seen by a reconciliation round.
    prev: Mutex<Arc<Vec<Annotation>>>,
}

impl FrameSync {
    pub fn new(
        store: Arc<AnnotationStore>,
        frame_registry: Arc<FrameRegistry>,
        bridge: Arc<Bridge>,
        event_capacity: usize,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(event_capacity);
        Arc::new(Self {
            store,
            frame_registry,
            bridge,
            event_tx,
            in_page: Mutex::new(HashSet::new()),
            // Starts as a snapshot the store never handed out, so the first
            // round always runs.
            prev: Mutex::new(Arc::new(Vec::new())),
        })
    }

    /// Subscribe to the notifications this engine raises upstream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SidebarEvent> {
        self.event_tx.subscribe()
    }

    /// Wire the collaborators together and start watching for frames.
    ///
    /// Returns the discovery pump handle; the engine itself needs no task of
    /// its own, every round runs on the call stack of the store mutation
    /// that triggered it.
    pub fn connect(self: Arc<Self>, discovery: Discovery) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(&self);
        self.bridge
            .on_connect(move |channel| Arc::clone(&this).add_frame(channel));

        let this = Arc::clone(&self);
        self.bridge
            .on("beforeCreateAnnotation", move |payload| this.on_before_create(payload));
        let this = Arc::clone(&self);
        self.bridge.on("sync", move |payload| this.on_sync(payload));

        let this = Arc::clone(&self);
        self.store.subscribe(move || this.reconcile());

        discovery.start(Arc::clone(&self.bridge))
    }

    /// Highlight the given annotations in connected frames.
    pub fn focus_annotations(&self, tags: &[Tag]) {
        if let Ok(payload) = serde_json::to_value(tags) {
            let _ = self.bridge.call("focusAnnotations", payload);
        }
    }

    /// Scroll frames to the highlight for an annotation.
    pub fn scroll_to_annotation(&self, tag: &Tag) {
        let _ = self
            .bridge
            .call("scrollToAnnotation", Value::String(tag.as_str().to_owned()));
    }

    /// Currently connected frames.
    pub fn frames(&self) -> Vec<FrameInfo> {
        self.frame_registry.frames()
    }

    /// One outbound reconciliation round: push the minimal delta between the
    /// store and what frames are rendering.
    fn reconcile(&self) {
        let annotations = self.store.annotations();
        let mut in_page = self.in_page.lock();
        {
            let prev = self.prev.lock();
            if Arc::ptr_eq(&annotations, &prev) {
                return;
            }
        }

        let mut in_sidebar: HashSet<&Tag> = HashSet::new();
        let mut added: Vec<&Annotation> = Vec::new();
        for annotation in annotations.iter() {
            if is_reply(annotation) {
                // Frames never render replies.
                continue;
            }
            in_sidebar.insert(&annotation.tag);
            if !in_page.contains(&annotation.tag) {
                added.push(annotation);
            }
        }

        // Swap the snapshot reference unconditionally so the fast path stays
        // correct even when the delta is empty.
        let prev = std::mem::replace(&mut *self.prev.lock(), Arc::clone(&annotations));
        let deleted: Vec<&Annotation> = prev
            .iter()
            .filter(|annotation| !in_sidebar.contains(&annotation.tag))
            .collect();

        // Additions flush before deletions, batched into a single call.
        if !added.is_empty() {
            let payload: Vec<WireAnnotation> =
                added.iter().map(|a| WireAnnotation::from_annotation(a)).collect();
            if let Ok(json) = serde_json::to_value(&payload) {
                let delivered = self.bridge.call("loadAnnotations", json);
                tracing::debug!(count = added.len(), channels = delivered, "Loaded annotations");
            }
            for annotation in &added {
                let _ = in_page.insert(annotation.tag.clone());
            }
        }
        for annotation in deleted {
            if let Ok(json) = serde_json::to_value(WireAnnotation::from_annotation(annotation)) {
                let _ = self.bridge.call("deleteAnnotation", json);
            }
            let _ = in_page.remove(&annotation.tag);
        }
    }

    /// A frame reports an annotation created locally (note or highlight).
    ///
    /// The tag goes into the in-page set right away so the next round does
    /// not push the annotation straight back; it is trusted only as an
    /// opaque correlation key.
    fn on_before_create(&self, payload: Value) {
        let event: CreateEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(%error, "Malformed beforeCreateAnnotation payload, dropping");
                return;
            }
        };
        // Duplicate creation events for a known tag are a no-op insert.
        let _ = self.in_page.lock().insert(event.tag.clone());
        let annotation = event.msg.into_annotation(event.tag);
        let _ = self
            .event_tx
            .send(SidebarEvent::BeforeAnnotationCreated { annotation });
    }

    /// A frame reports anchoring results for previously pushed annotations.
    ///
    /// Entries for untracked tags are accepted silently: anchoring
    /// callbacks race with deletes, and the frame clock is not ours.
    fn on_sync(&self, payload: Value) {
        let entries: Vec<SyncEntry> = match serde_json::from_value(payload) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(%error, "Malformed sync payload, dropping");
                return;
            }
        };

        let mut tags = Vec::with_capacity(entries.len());
        for entry in entries {
            // The in-page lock is released before touching the store: the
            // store notifies synchronously and the round re-takes it.
            let _ = self.in_page.lock().insert(entry.tag.clone());
            let _ = self.store.update_anchor_status(&entry.tag, entry.msg.orphan);
            tags.push(entry.tag);
        }
        if !tags.is_empty() {
            let _ = self.event_tx.send(SidebarEvent::AnnotationsSynced { tags });
        }
    }

    /// Handshake with a newly connected channel: ask the frame what document
    /// it shows, then register it. An error reply (or a malformed one)
    /// tears the channel down; a frame that never answers simply never
    /// registers.
    fn add_frame(self: Arc<Self>, channel: Arc<Channel>) {
        let this = self;
        tokio::spawn(async move {
            let reply = match channel.request("getDocumentInfo", Value::Null).await {
                Ok(reply) => reply,
                Err(error) => {
                    tracing::warn!(
                        channel_id = %channel.id(),
                        %error,
                        "Document info query failed, destroying channel"
                    );
                    channel.destroy();
                    return;
                }
            };
            match serde_json::from_value::<DocumentInfoReply>(reply) {
                Ok(info) => {
                    let frame = FrameInfo::from_document_info(channel.id().clone(), info);
                    this.frame_registry.frame_connected(frame);
                }
                Err(error) => {
                    tracing::warn!(
                        channel_id = %channel.id(),
                        %error,
                        "Malformed document info reply, destroying channel"
                    );
                    channel.destroy();
                }
            }
        });
    }
}
