pub mod discovery;
pub mod engine;

pub use discovery::Discovery;
pub use engine::FrameSync;
