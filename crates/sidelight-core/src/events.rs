use serde::Serialize;

use crate::annotation::Annotation;
use crate::ids::Tag;

/// Notifications the sync engine raises toward the rest of the sidebar.
///
/// Delivered over a `tokio::sync::broadcast` channel; listeners that lag
/// simply miss events, which is acceptable because the store remains the
/// source of truth.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidebarEvent {
    /// A frame created an annotation locally; the sidebar should
    /// materialize it into the store.
    BeforeAnnotationCreated { annotation: Annotation },
    /// Anchoring finished for a batch of previously pushed annotations.
    AnnotationsSynced { tags: Vec<Tag> },
}
