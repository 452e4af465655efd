pub mod bridge;
pub mod channel;
pub mod error;

pub use bridge::Bridge;
pub use channel::{Channel, ChannelEndpoint, ChannelMessage};
pub use error::BridgeError;
