#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The channel was destroyed before or while a call was in flight.
    #[error("channel closed")]
    ChannelClosed,

    /// The frame replied with an error.
    #[error("call failed: {0}")]
    Call(String),
}
