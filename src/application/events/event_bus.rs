//! Broadcast of roaming network events
//!
//! Entity and status changes of every roaming network hosted by the node, as
//! well as overlay link changes, go through one [`EventBus`]. Subscribers
//! either see everything or only one roaming network (plus node-wide events).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::types::{Event, EventMessage};
use crate::domain::ids::RoamingNetworkId;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Slow subscribers lose the oldest events once `capacity` are queued.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: Event) {
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();
        let subject_id = message.event.subject_id().to_string();
        let roaming_network_id = message
            .event
            .roaming_network_id()
            .map(|id| id.to_string())
            .unwrap_or_default();

        let delivered = self.sender.send(message).unwrap_or(0);
        debug!(
            event_type,
            subject_id,
            roaming_network_id,
            subscribers = delivered,
            "Roaming network event"
        );
    }

    /// Every event published on the bus.
    pub fn subscribe(&self) -> EventSubscriber {
        self.new_subscriber(None)
    }

    /// Events of one roaming network, plus node-wide events such as overlay
    /// link changes.
    pub fn subscribe_to(&self, roaming_network_id: RoamingNetworkId) -> EventSubscriber {
        self.new_subscriber(Some(roaming_network_id))
    }

    fn new_subscriber(&self, roaming_network: Option<RoamingNetworkId>) -> EventSubscriber {
        let receiver = self.sender.subscribe();
        let total = self.subscriber_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            total,
            roaming_network_id = roaming_network.as_ref().map(|id| id.as_str()).unwrap_or("*"),
            "Event subscriber added"
        );

        EventSubscriber {
            receiver,
            roaming_network,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    roaming_network: Option<RoamingNetworkId>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    fn wants(&self, message: &EventMessage) -> bool {
        match (&self.roaming_network, message.event.roaming_network_id()) {
            (Some(wanted), Some(id)) => wanted == id,
            _ => true,
        }
    }

    /// Next matching event; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if self.wants(&msg) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber lagged behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(msg) if self.wants(&msg) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber lagged behind");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        let prev = self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        info!(remaining = prev.saturating_sub(1), "Event subscriber dropped");
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{EntityEvent, NodeEvent};
    use chrono::Utc;

    fn network(id: &str) -> RoamingNetworkId {
        RoamingNetworkId::parse(id).unwrap()
    }

    fn operator_added(network_id: &str, operator_id: &str) -> Event {
        let rn = network(network_id);
        Event::OperatorAdded(EntityEvent::now(&rn, &rn, operator_id))
    }

    fn node_connected(node_id: &str) -> Event {
        Event::NodeConnected(NodeEvent {
            node_id: node_id.to_string(),
            remote_addr: None,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();

        bus.publish(operator_added("Prod", "DE*GEF"));

        let received = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            subscriber.recv(),
        )
        .await
        .expect("Timeout")
        .expect("No message");

        assert_eq!(received.event.event_type(), "operator_added");
        assert_eq!(received.event.subject_id(), "DE*GEF");
        assert_eq!(received.event.roaming_network_id(), Some(&network("Prod")));
    }

    #[test]
    fn network_subscription_skips_other_networks() {
        let bus = EventBus::new();
        let mut prod = bus.subscribe_to(network("Prod"));

        bus.publish(operator_added("QA", "DE*QAA"));
        bus.publish(operator_added("Prod", "DE*GEF"));
        bus.publish(node_connected("HUB"));

        assert_eq!(prod.try_recv().unwrap().event.subject_id(), "DE*GEF");
        assert_eq!(prod.try_recv().unwrap().event.event_type(), "node_connected");
        assert!(prod.try_recv().is_none());
    }

    #[test]
    fn subscriber_count_follows_drops() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let all = bus.subscribe();
        let _prod = bus.subscribe_to(network("Prod"));
        assert_eq!(bus.subscriber_count(), 2);

        drop(all);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
