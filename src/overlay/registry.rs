//! Link registry — active WebSocket links to neighbouring overlay nodes

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::node_id::NetworkingNodeId;

/// A frame queued for a link's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Which side opened the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// A peer connected to our server.
    Inbound,
    /// We connected to the peer (uplink).
    Outbound,
}

#[derive(Debug)]
pub struct Link {
    pub node_id: NetworkingNodeId,
    pub direction: LinkDirection,
    pub remote_addr: Option<SocketAddr>,
    sender: mpsc::UnboundedSender<OutboundFrame>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Link {
    pub fn send(&self, frame: OutboundFrame) -> Result<(), String> {
        self.sender
            .send(frame)
            .map_err(|e| format!("Failed to queue frame: {}", e))
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Thread-safe registry of links to neighbouring nodes
pub struct LinkRegistry {
    links: DashMap<NetworkingNodeId, Link>,
}

/// Shared, reference-counted link registry
pub type SharedLinkRegistry = Arc<LinkRegistry>;

impl LinkRegistry {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
        }
    }

    /// Wrap in `Arc` for shared ownership
    pub fn shared() -> SharedLinkRegistry {
        Arc::new(Self::new())
    }

    /// Register a link; an existing link to the same node is replaced.
    pub fn register(
        &self,
        node_id: NetworkingNodeId,
        direction: LinkDirection,
        remote_addr: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<OutboundFrame>,
    ) {
        info!(node_id = %node_id, ?direction, "Registering overlay link");
        let now = Utc::now();
        let link = Link {
            node_id: node_id.clone(),
            direction,
            remote_addr,
            sender,
            connected_at: now,
            last_activity: now,
        };
        if self.links.insert(node_id.clone(), link).is_some() {
            warn!(node_id = %node_id, "Replaced existing overlay link");
        }
    }

    pub fn unregister(&self, node_id: &NetworkingNodeId) {
        if self.links.remove(node_id).is_some() {
            info!(node_id = %node_id, "Unregistered overlay link");
        } else {
            warn!(node_id = %node_id, "Attempted to unregister unknown link");
        }
    }

    pub fn send_to(&self, node_id: &NetworkingNodeId, frame: OutboundFrame) -> Result<(), String> {
        match self.links.get(node_id) {
            Some(link) => link.send(frame),
            None => Err(format!("Node {} not connected", node_id)),
        }
    }

    pub fn touch(&self, node_id: &NetworkingNodeId) {
        if let Some(mut link) = self.links.get_mut(node_id) {
            link.touch();
        }
    }

    pub fn is_connected(&self, node_id: &NetworkingNodeId) -> bool {
        self.links.contains_key(node_id)
    }

    pub fn connected_ids(&self) -> Vec<NetworkingNodeId> {
        let mut ids: Vec<_> = self.links.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn direction(&self, node_id: &NetworkingNodeId) -> Option<LinkDirection> {
        self.links.get(node_id).map(|l| l.direction)
    }

    /// Number of active links
    pub fn count(&self) -> usize {
        self.links.len()
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_reaches_registered_link() {
        let registry = LinkRegistry::new();
        let node = NetworkingNodeId::parse("CS1").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register(node.clone(), LinkDirection::Inbound, None, tx);
        assert!(registry.is_connected(&node));
        assert_eq!(registry.direction(&node), Some(LinkDirection::Inbound));

        registry
            .send_to(&node, OutboundFrame::Text("[3,\"1\",{}]".into()))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text("[3,\"1\",{}]".into()));

        registry.unregister(&node);
        assert_eq!(registry.count(), 0);
        assert!(registry
            .send_to(&node, OutboundFrame::Binary(vec![1]))
            .is_err());
    }
}
