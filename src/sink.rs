use crate::hop::Hop;
use tokio::sync::{broadcast, mpsc};

/// Progress event pushed to the consumer of a trace.
#[derive(Clone, Debug, PartialEq)]
pub enum HopEvent {
    /// A probe outcome was classified. Emitted once per TTL, in TTL order.
    Hop(Hop),
    /// Lookup metadata was attached to a previously reported hop.
    HopInfo(Hop),
}

impl HopEvent {
    /// Event name as seen by UI hosts.
    pub fn name(&self) -> &'static str {
        match self {
            HopEvent::Hop(_) => "hop",
            HopEvent::HopInfo(_) => "hop info",
        }
    }

    pub fn hop(&self) -> &Hop {
        match self {
            HopEvent::Hop(hop) | HopEvent::HopInfo(hop) => hop,
        }
    }

    /// Payload rendered as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self.hop())
    }
}

/// Receiver of hop events.
///
/// Called from the sweep task and from lookup tasks concurrently, so
/// implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: HopEvent);
}

impl EventSink for broadcast::Sender<HopEvent> {
    fn emit(&self, event: HopEvent) {
        // No subscribers is fine.
        let _ = self.send(event);
    }
}

impl EventSink for mpsc::UnboundedSender<HopEvent> {
    fn emit(&self, event: HopEvent) {
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_event_names() {
        let hop = Hop::timeout(1);
        assert_eq!(HopEvent::Hop(hop.clone()).name(), "hop");
        assert_eq!(HopEvent::HopInfo(hop).name(), "hop info");
    }

    #[test]
    fn test_to_json() {
        let hop = Hop::reply(1, "192.168.1.1".parse().unwrap(), Duration::from_millis(1));
        let json = HopEvent::Hop(hop).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"number":1,"address":"192.168.1.1","rtt":1.0,"isPrivate":true}"#
        );
    }

    #[tokio::test]
    async fn test_channel_sinks_deliver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(HopEvent::Hop(Hop::timeout(1)));
        assert_eq!(rx.recv().await, Some(HopEvent::Hop(Hop::timeout(1))));

        let (tx, mut rx) = broadcast::channel(4);
        tx.emit(HopEvent::Hop(Hop::timeout(2)));
        assert_eq!(rx.recv().await.unwrap(), HopEvent::Hop(Hop::timeout(2)));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<HopEvent>(4);
        drop(rx);
        tx.emit(HopEvent::Hop(Hop::timeout(1)));
    }
}
