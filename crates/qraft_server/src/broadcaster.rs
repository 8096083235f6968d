use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Sink for queue and prompt change notifications. Implementations must not
/// block; the queue calls this from its event loop.
pub trait QueueBroadcaster: Send + Sync {
    fn broadcast(&self, event: &str, data: Value);
}

impl<F> QueueBroadcaster for F
where
    F: Fn(&str, Value) + Send + Sync,
{
    fn broadcast(&self, event: &str, data: Value) {
        self(event, data)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BroadcastMessage {
    pub event: String,
    pub data: Value,
}

/// Fans notifications out to any number of subscribers. Slow subscribers
/// observe `RecvError::Lagged` rather than stalling the queue.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl QueueBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: &str, data: Value) {
        let _ = self.tx.send(BroadcastMessage {
            event: event.to_owned(),
            data,
        });
    }
}
