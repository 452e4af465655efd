use std::sync::Arc;

use sidelight_bridge::{Bridge, Channel};
use tokio::sync::mpsc;

/// Feed of channels for newly located frames.
///
/// The peer-locating mechanism itself lives in the transport layer; it
/// pushes a channel here for every frame it finds. Discovery runs for the
/// life of the process, so frames can connect at any time after startup.
pub struct Discovery {
    rx: mpsc::Receiver<Arc<Channel>>,
}

impl Discovery {
    /// Create a discovery feed and the sender the transport drives it with.
    pub fn feed(capacity: usize) -> (mpsc::Sender<Arc<Channel>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Spawn the pump that registers each discovered channel with the
    /// bridge. Registration fires the bridge's connect callbacks, which is
    /// where the metadata handshake starts.
    pub fn start(mut self, bridge: Arc<Bridge>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(channel) = self.rx.recv().await {
                bridge.add_channel(channel);
            }
            tracing::info!("Discovery feed closed");
        })
    }
}
