pub mod annotation;
pub mod events;
pub mod ids;
pub mod wire;

pub use annotation::{is_reply, Annotation};
pub use events::SidebarEvent;
pub use ids::{ChannelId, Tag};
pub use wire::{
    CreateEvent, DocumentInfoReply, DocumentLink, DocumentMetadata, SyncEntry, SyncMsg,
    WireAnnotation, WireMsg,
};
