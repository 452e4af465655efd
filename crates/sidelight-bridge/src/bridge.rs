use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use sidelight_core::ids::ChannelId;

use crate::channel::Channel;

type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;
type ConnectHandler = Arc<dyn Fn(Arc<Channel>) + Send + Sync>;

/// Registry of channels to connected frames.
///
/// Outbound calls fan out to every live channel; inbound frame events are
/// routed to named handlers. Inbound payloads come from untrusted frames, so
/// unknown events and malformed payloads are logged and dropped, never
/// fatal.
pub struct Bridge {
    channels: DashMap<ChannelId, Arc<Channel>>,
    handlers: DashMap<String, EventHandler>,
    on_connect: Mutex<Vec<ConnectHandler>>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            handlers: DashMap::new(),
            on_connect: Mutex::new(Vec::new()),
        }
    }

    /// Register a channel and fire the connect callbacks for it.
    pub fn add_channel(&self, channel: Arc<Channel>) {
        tracing::debug!(channel_id = %channel.id(), "Channel connected");
        self.channels.insert(channel.id().clone(), Arc::clone(&channel));
        let callbacks: Vec<ConnectHandler> = self.on_connect.lock().clone();
        for callback in callbacks {
            callback(Arc::clone(&channel));
        }
    }

    /// Destroy and drop a channel.
    pub fn remove_channel(&self, id: &ChannelId) {
        if let Some((_, channel)) = self.channels.remove(id) {
            channel.destroy();
            tracing::debug!(channel_id = %id, "Channel removed");
        }
    }

    /// Fan a fire-and-forget call out to every live channel. Destroyed
    /// channels are pruned along the way. Returns the number of channels
    /// the call was queued on.
    pub fn call(&self, method: &str, params: Value) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in self.channels.iter() {
            let channel = entry.value();
            if channel.is_destroyed() {
                dead.push(channel.id().clone());
            } else if channel.notify(method, params.clone()) {
                delivered += 1;
            }
        }
        for id in dead {
            let _ = self.channels.remove(&id);
            tracing::debug!(channel_id = %id, "Pruned destroyed channel");
        }
        delivered
    }

    /// Register a handler for a named inbound event. Re-registering replaces
    /// the previous handler.
    pub fn on(&self, event: &str, handler: impl Fn(Value) + Send + Sync + 'static) {
        if self.handlers.insert(event.to_owned(), Arc::new(handler)).is_some() {
            tracing::warn!(event = event, "Replacing existing event handler");
        }
    }

    /// Route an inbound frame event to its handler. Returns whether a
    /// handler was found.
    pub fn dispatch(&self, event: &str, payload: Value) -> bool {
        // Clone the handler out so re-entrant registration cannot deadlock.
        let handler = self.handlers.get(event).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => {
                tracing::warn!(event = event, "Dropping event with no handler");
                false
            }
        }
    }

    /// Register a callback fired for every channel added after this call.
    pub fn on_connect(&self, callback: impl Fn(Arc<Channel>) + Send + Sync + 'static) {
        self.on_connect.lock().push(Arc::new(callback));
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
