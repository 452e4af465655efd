use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::Tag;

/// A sidebar-side annotation.
///
/// Only `document`, `target` and `uri` ever cross the trust boundary to a
/// frame (see [`crate::wire::WireAnnotation`]). Everything else (anchor
/// status, persistent storage id, reply back-references) is private to the
/// sidebar.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    pub tag: Tag,
    pub uri: String,
    /// Opaque document descriptor (title, dc metadata, links).
    #[serde(default)]
    pub document: Value,
    /// Anchoring selectors. Opaque to the sidebar, interpreted by frames.
    #[serde(default)]
    pub target: Value,
    /// Back-references to parent annotations. Non-empty means reply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Whether the last anchoring attempt failed to match page content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphan: Option<bool>,
    /// Persistent storage id, if the annotation has been saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Annotation {
    /// New top-level annotation with a fresh session tag.
    pub fn new(uri: impl Into<String>) -> Self {
        Self::with_tag(Tag::new(), uri)
    }

    pub fn with_tag(tag: Tag, uri: impl Into<String>) -> Self {
        Self {
            tag,
            uri: uri.into(),
            document: Value::Null,
            target: Value::Null,
            references: Vec::new(),
            orphan: None,
            id: None,
        }
    }

    /// New reply to an existing annotation. Replies are never pushed to
    /// frames.
    pub fn reply_to(parent: &Annotation, uri: impl Into<String>) -> Self {
        let mut annotation = Self::new(uri);
        annotation.references = vec![parent
            .id
            .clone()
            .unwrap_or_else(|| parent.tag.as_str().to_owned())];
        annotation
    }
}

/// A reply is an annotation that back-references another annotation.
///
/// Kept as a free predicate over the record's shape so callers stay
/// decoupled from annotation internals.
pub fn is_reply(annotation: &Annotation) -> bool {
    !annotation.references.is_empty()
}
