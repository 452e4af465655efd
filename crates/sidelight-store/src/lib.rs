pub mod annotations;
pub mod frames;

pub use annotations::AnnotationStore;
pub use frames::{FrameInfo, FrameRegistry};
