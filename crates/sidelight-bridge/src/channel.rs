use std::sync::Arc;

use serde_json::Value;
use sidelight_core::ids::ChannelId;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;

/// A named call delivered to the frame side of a channel.
pub struct ChannelMessage {
    pub method: String,
    pub params: Value,
    reply: Option<oneshot::Sender<Result<Value, String>>>,
}

impl ChannelMessage {
    /// Whether the caller is waiting for a reply.
    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Send the reply for a request. Returns false for fire-and-forget
    /// messages or when the caller has gone away.
    pub fn respond(self, result: Result<Value, String>) -> bool {
        match self.reply {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

/// The sidebar side of a frame channel.
///
/// Calls are at-most-once: `notify` drops on a full queue or a destroyed
/// channel, and nothing here retries. Reconciliation on the next store
/// change is what heals a missed delivery.
pub struct Channel {
    id: ChannelId,
    tx: mpsc::Sender<ChannelMessage>,
    cancel: CancellationToken,
}

impl Channel {
    /// Create a connected channel/endpoint pair. The endpoint is the frame
    /// side, driven by the transport (or directly by tests).
    pub fn pair(capacity: usize) -> (Arc<Self>, ChannelEndpoint) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let channel = Arc::new(Self {
            id: ChannelId::new(),
            tx,
            cancel: cancel.clone(),
        });
        let endpoint = ChannelEndpoint {
            channel_id: channel.id.clone(),
            rx,
            cancel,
        };
        (channel, endpoint)
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// Fire-and-forget call. Returns whether the message was queued.
    pub fn notify(&self, method: &str, params: Value) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let message = ChannelMessage {
            method: method.to_owned(),
            params,
            reply: None,
        };
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    channel_id = %self.id,
                    method = %dropped.method,
                    "Send queue full, dropping call"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Call with reply. Waits as long as the frame takes to answer; there is
    /// no timeout. Resolves with `ChannelClosed` if the channel is destroyed
    /// while waiting or the frame side goes away without answering.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        if self.is_destroyed() {
            return Err(BridgeError::ChannelClosed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        let message = ChannelMessage {
            method: method.to_owned(),
            params,
            reply: Some(reply_tx),
        };
        self.tx
            .send(message)
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;

        tokio::select! {
            () = self.cancel.cancelled() => Err(BridgeError::ChannelClosed),
            reply = reply_rx => match reply {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(message)) => Err(BridgeError::Call(message)),
                Err(_) => Err(BridgeError::ChannelClosed),
            },
        }
    }

    /// Tear the channel down. Idempotent; cancels any in-flight request.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The frame side of a channel.
pub struct ChannelEndpoint {
    channel_id: ChannelId,
    rx: mpsc::Receiver<ChannelMessage>,
    cancel: CancellationToken,
}

impl ChannelEndpoint {
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Receive the next call, or None once the channel is destroyed and
    /// drained.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        tokio::select! {
            () = self.cancel.cancelled() => None,
            message = self.rx.recv() => message,
        }
    }

    /// Non-blocking receive, for synchronous inspection in tests.
    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn notify_delivers_to_endpoint() {
        let (channel, mut endpoint) = Channel::pair(8);
        assert!(channel.notify("loadAnnotations", json!([{"tag": "ann_a"}])));

        let message = endpoint.try_recv().unwrap();
        assert_eq!(message.method, "loadAnnotations");
        assert_eq!(message.params[0]["tag"], "ann_a");
        assert!(!message.expects_reply());
    }

    #[tokio::test]
    async fn notify_drops_on_full_queue() {
        let (channel, _endpoint) = Channel::pair(1);
        assert!(channel.notify("a", Value::Null));
        assert!(!channel.notify("b", Value::Null));
    }

    #[tokio::test]
    async fn notify_after_destroy_is_dropped() {
        let (channel, mut endpoint) = Channel::pair(8);
        channel.destroy();
        assert!(!channel.notify("loadAnnotations", Value::Null));
        assert!(endpoint.recv().await.is_none());
    }

    #[tokio::test]
    async fn request_resolves_with_reply() {
        let (channel, mut endpoint) = Channel::pair(8);

        let responder = tokio::spawn(async move {
            let message = endpoint.recv().await.unwrap();
            assert_eq!(message.method, "getDocumentInfo");
            assert!(message.expects_reply());
            message.respond(Ok(json!({"uri": "http://example.com"})));
        });

        let reply = channel.request("getDocumentInfo", Value::Null).await.unwrap();
        assert_eq!(reply["uri"], "http://example.com");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn request_surfaces_frame_error() {
        let (channel, mut endpoint) = Channel::pair(8);

        let responder = tokio::spawn(async move {
            let message = endpoint.recv().await.unwrap();
            message.respond(Err("no document loaded".into()));
        });

        let err = channel.request("getDocumentInfo", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Call(message) if message == "no document loaded"));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn request_cancelled_by_destroy() {
        let (channel, _endpoint) = Channel::pair(8);

        let waiter = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.request("getDocumentInfo", Value::Null).await })
        };

        // Let the request get queued before tearing down.
        tokio::task::yield_now().await;
        channel.destroy();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::ChannelClosed));
    }

    #[tokio::test]
    async fn request_fails_when_endpoint_dropped() {
        let (channel, endpoint) = Channel::pair(8);
        drop(endpoint);
        let err = channel.request("getDocumentInfo", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::ChannelClosed));
    }

    #[test]
    fn destroy_is_idempotent() {
        let (channel, _endpoint) = Channel::pair(8);
        assert!(!channel.is_destroyed());
        channel.destroy();
        channel.destroy();
        assert!(channel.is_destroyed());
    }
}
