//! Payload shapes that cross the sidebar/frame trust boundary.
//!
//! Frames run untrusted third-party code, so the outbound projection carries
//! only what a frame needs to identify an annotation within the session and
//! anchor it in the page. Field names are pinned to the wire contract with
//! serde renames; nothing outside these structs is ever serialized to a
//! frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotation::Annotation;
use crate::ids::Tag;

/// The anchoring payload of a [`WireAnnotation`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WireMsg {
    #[serde(default)]
    pub document: Value,
    #[serde(default)]
    pub target: Value,
    #[serde(default)]
    pub uri: String,
}

/// Minimal representation of an annotation sent to or received from a frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireAnnotation {
    pub tag: Tag,
    pub msg: WireMsg,
}

impl WireAnnotation {
    /// Project an annotation down to the trust-boundary fields.
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            tag: annotation.tag.clone(),
            msg: WireMsg {
                document: annotation.document.clone(),
                target: annotation.target.clone(),
                uri: annotation.uri.clone(),
            },
        }
    }
}

impl WireMsg {
    /// Materialize a sidebar annotation from frame-supplied fields.
    ///
    /// The tag is trusted only as an opaque correlation key; everything the
    /// sidebar keeps private starts out unset.
    pub fn into_annotation(self, tag: Tag) -> Annotation {
        let mut annotation = Annotation::with_tag(tag, self.uri);
        annotation.document = self.document;
        annotation.target = self.target;
        annotation
    }
}

/// Inbound `beforeCreateAnnotation` event payload.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateEvent {
    pub tag: Tag,
    #[serde(default)]
    pub msg: WireMsg,
}

/// One entry of an inbound `sync` batch: anchoring completed for a tag.
#[derive(Clone, Debug, Deserialize)]
pub struct SyncEntry {
    pub tag: Tag,
    pub msg: SyncMsg,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SyncMsg {
    #[serde(rename = "$orphan")]
    pub orphan: bool,
}

/// Reply to the `getDocumentInfo` handshake call.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentInfoReply {
    pub uri: String,
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
}

/// Document metadata reported by non-HTML viewers (PDF and friends).
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "documentFingerprint", default)]
    pub document_fingerprint: Option<String>,
    #[serde(default)]
    pub link: Vec<DocumentLink>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DocumentLink {
    pub href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_carries_only_wire_fields() {
        let mut annotation = Annotation::new("http://example.com");
        annotation.orphan = Some(true);
        annotation.id = Some("store-id-9".into());
        annotation.references = vec!["parent".into()];
        annotation.target = serde_json::json!([{"selector": [{"type": "TextQuoteSelector"}]}]);

        let wire = WireAnnotation::from_annotation(&annotation);
        let json = serde_json::to_value(&wire).unwrap();

        let mut top: Vec<&String> = json.as_object().unwrap().keys().collect();
        top.sort();
        assert_eq!(top, ["msg", "tag"]);
        let mut msg: Vec<&String> = json["msg"].as_object().unwrap().keys().collect();
        msg.sort();
        assert_eq!(msg, ["document", "target", "uri"]);

        assert_eq!(json["tag"], annotation.tag.as_str());
        assert_eq!(json["msg"]["uri"], "http://example.com");
        // Sidebar-private fields must never leak.
        let serialized = json.to_string();
        assert!(!serialized.contains("orphan"));
        assert!(!serialized.contains("store-id-9"));
        assert!(!serialized.contains("references"));
    }

    #[test]
    fn into_annotation_keeps_frame_fields() {
        let msg = WireMsg {
            document: serde_json::json!({"title": "Page"}),
            target: serde_json::json!([{"selector": []}]),
            uri: "http://example.com".into(),
        };
        let annotation = msg.into_annotation(Tag::from_raw("ann_from_frame"));
        assert_eq!(annotation.tag.as_str(), "ann_from_frame");
        assert_eq!(annotation.uri, "http://example.com");
        assert_eq!(annotation.document["title"], "Page");
        assert!(annotation.id.is_none());
        assert!(annotation.orphan.is_none());
    }

    #[test]
    fn sync_entry_reads_dollar_orphan() {
        let json = r#"{"tag": "ann_a", "msg": {"$orphan": true}}"#;
        let entry: SyncEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.tag.as_str(), "ann_a");
        assert!(entry.msg.orphan);
    }

    #[test]
    fn create_event_tolerates_missing_msg() {
        let json = r#"{"tag": "ann_b"}"#;
        let event: CreateEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.tag.as_str(), "ann_b");
        assert!(event.msg.uri.is_empty());
    }

    #[test]
    fn document_info_plain_page() {
        let json = r#"{"uri": "http://example.com"}"#;
        let info: DocumentInfoReply = serde_json::from_str(json).unwrap();
        assert_eq!(info.uri, "http://example.com");
        assert!(info.metadata.is_none());
    }

    #[test]
    fn document_info_with_fingerprint() {
        let json = r#"{
            "uri": "http://example.com/paper.pdf",
            "metadata": {
                "documentFingerprint": "fp123",
                "link": [{"href": "urn:x-pdf:fp123"}, {"href": "http://example.com/paper.pdf"}]
            }
        }"#;
        let info: DocumentInfoReply = serde_json::from_str(json).unwrap();
        let metadata = info.metadata.unwrap();
        assert_eq!(metadata.document_fingerprint.as_deref(), Some("fp123"));
        assert_eq!(metadata.link.len(), 2);
        assert_eq!(metadata.link[0].href, "urn:x-pdf:fp123");
    }
}
