use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sidelight_core::ids::ChannelId;
use sidelight_core::wire::DocumentInfoReply;

/// Metadata for a connected frame, derived from the `getDocumentInfo`
/// handshake.
#[derive(Clone, Debug, Serialize)]
pub struct FrameInfo {
    pub channel_id: ChannelId,
    /// Primary URI of the document the frame is displaying.
    pub uri: String,
    /// URIs to pass to the search API when looking up annotations for this
    /// document.
    #[serde(rename = "searchUris")]
    pub search_uris: Vec<String>,
    /// Document fingerprint, reported by non-HTML viewers.
    #[serde(rename = "documentFingerprint")]
    pub document_fingerprint: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl FrameInfo {
    /// Derive frame metadata from a handshake reply.
    ///
    /// Ordinary web pages have exactly one canonical URI. A reported
    /// fingerprint marks a format (PDF and friends) with multiple equivalent
    /// access URIs, in which case every metadata link overrides the single
    /// document URI as the searchable set.
    pub fn from_document_info(channel_id: ChannelId, info: DocumentInfoReply) -> Self {
        let mut search_uris = vec![info.uri.clone()];
        let mut document_fingerprint = None;
        if let Some(metadata) = info.metadata {
            if let Some(fingerprint) = metadata.document_fingerprint {
                document_fingerprint = Some(fingerprint);
                search_uris = metadata.link.into_iter().map(|link| link.href).collect();
            }
        }
        Self {
            channel_id,
            uri: info.uri,
            search_uris,
            document_fingerprint,
            connected_at: Utc::now(),
        }
    }
}

/// Connected-frame records, one per completed handshake.
pub struct FrameRegistry {
    frames: RwLock<Vec<FrameInfo>>,
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self {
            frames: RwLock::new(Vec::new()),
        }
    }

    pub fn frame_connected(&self, frame: FrameInfo) {
        tracing::info!(
            channel_id = %frame.channel_id,
            uri = %frame.uri,
            search_uris = frame.search_uris.len(),
            "Frame connected"
        );
        self.frames.write().push(frame);
    }

    /// Drop the record for a torn-down channel. Returns whether one existed.
    pub fn frame_disconnected(&self, channel_id: &ChannelId) -> bool {
        let mut frames = self.frames.write();
        let before = frames.len();
        frames.retain(|frame| &frame.channel_id != channel_id);
        before != frames.len()
    }

    pub fn frames(&self) -> Vec<FrameInfo> {
        self.frames.read().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.read().len()
    }
}
