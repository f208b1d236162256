//! Overlay WebSocket transport
//!
//! Peers connect at `ws://<host>:<port>/<nodeId>`. Text frames carry JSON
//! messages, binary frames carry binary messages. A node may also keep a
//! link to an uplink node it connects to itself.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use super::node_id::NetworkingNodeId;
use super::registry::{LinkDirection, OutboundFrame};
use super::router::SharedOverlayRouter;
use crate::application::events::{Event, NodeEvent, SharedEventBus};
use crate::support::shutdown::ShutdownSignal;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Delay between uplink connection attempts
const UPLINK_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Accepts overlay peers on a TCP address
pub struct OverlayServer {
    address: String,
    router: SharedOverlayRouter,
    event_bus: SharedEventBus,
    shutdown_signal: Option<ShutdownSignal>,
}

impl OverlayServer {
    pub fn new(address: impl Into<String>, router: SharedOverlayRouter, event_bus: SharedEventBus) -> Self {
        Self {
            address: address.into(),
            router,
            event_bus,
            shutdown_signal: None,
        }
    }

    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    pub fn router(&self) -> &SharedOverlayRouter {
        &self.router
    }

    pub async fn run(&self) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.address).await?;
        info!(
            "🔌 Overlay node {} listening on ws://{}",
            self.router.local_id(),
            self.address
        );
        info!("   Peers should connect to: ws://{}/{{nodeId}}", self.address);

        match self.shutdown_signal.clone() {
            Some(shutdown) => self.run_with_shutdown(listener, shutdown).await,
            None => {
                while let Ok((stream, addr)) = listener.accept().await {
                    self.spawn_connection(stream, addr);
                }
                Ok(())
            }
        }
    }

    async fn run_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), BoxError> {
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = shutdown.notified().wait() => {
                    info!("🛑 Overlay server received shutdown signal");
                    self.graceful_shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let router = self.router.clone();
        let event_bus = self.event_bus.clone();
        let shutdown = self.shutdown_signal.clone();

        tokio::spawn(async move {
            if let Err(e) = accept_peer(stream, addr, router, event_bus, shutdown).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }

    async fn graceful_shutdown(&self) {
        let links = self.router.links();
        let connected = links.connected_ids();
        if !connected.is_empty() {
            info!("📢 Closing {} overlay links...", connected.len());
        }

        // Give link tasks a moment to flush queued frames.
        tokio::time::sleep(Duration::from_millis(500)).await;

        for node_id in connected {
            links.unregister(&node_id);
            self.router.cleanup_link(&node_id);
        }
        info!("✅ Overlay server shutdown complete");
    }
}

/// Node id from a handshake path such as `/CS1`.
fn node_id_from_path(path: &str) -> Option<NetworkingNodeId> {
    let id = path.trim_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    NetworkingNodeId::parse(id).ok()
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

async fn accept_peer(
    stream: TcpStream,
    addr: SocketAddr,
    router: SharedOverlayRouter,
    event_bus: SharedEventBus,
    shutdown: Option<ShutdownSignal>,
) -> Result<(), BoxError> {
    let mut peer_id: Option<NetworkingNodeId> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, response: Response| {
        let path = req.uri().path();
        debug!("WebSocket handshake from {}, path {}", addr, path);
        match node_id_from_path(path) {
            Some(id) => {
                peer_id = Some(id);
                Ok(response)
            }
            None => {
                warn!("Refusing peer {} with invalid path {}", addr, path);
                Err(reject(StatusCode::BAD_REQUEST, "Expected /<nodeId>"))
            }
        }
    })
    .await?;

    let peer_id = peer_id.ok_or("handshake finished without a node id")?;
    run_link(
        ws_stream,
        peer_id,
        LinkDirection::Inbound,
        Some(addr),
        router,
        event_bus,
        shutdown,
    )
    .await;
    Ok(())
}

/// Keep a link to `uplink_id` at `url` open, reconnecting until shutdown.
///
/// The uplink becomes the router's default route while it is connected.
pub async fn maintain_uplink(
    url: String,
    uplink_id: NetworkingNodeId,
    router: SharedOverlayRouter,
    event_bus: SharedEventBus,
    shutdown: ShutdownSignal,
) {
    let endpoint = format!("{}/{}", url.trim_end_matches('/'), router.local_id());
    while !shutdown.is_triggered() {
        info!(uplink = %uplink_id, "Connecting to uplink {}", endpoint);
        match tokio_tungstenite::connect_async(endpoint.as_str()).await {
            Ok((ws_stream, _)) => {
                router.set_default_route(Some(uplink_id.clone()));
                run_link(
                    ws_stream,
                    uplink_id.clone(),
                    LinkDirection::Outbound,
                    None,
                    router.clone(),
                    event_bus.clone(),
                    Some(shutdown.clone()),
                )
                .await;
                router.set_default_route(None);
            }
            Err(e) => warn!(uplink = %uplink_id, "Uplink connection failed: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(UPLINK_RETRY_DELAY) => {}
            _ = shutdown.notified().wait() => break,
        }
    }
    info!(uplink = %uplink_id, "Uplink maintenance stopped");
}

/// Pump frames between a WebSocket and the router until either side closes.
async fn run_link<S>(
    ws_stream: WebSocketStream<S>,
    node_id: NetworkingNodeId,
    direction: LinkDirection,
    remote_addr: Option<SocketAddr>,
    router: SharedOverlayRouter,
    event_bus: SharedEventBus,
    shutdown: Option<ShutdownSignal>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!("[{}] Connected ({:?})", node_id, direction);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();

    router
        .links()
        .register(node_id.clone(), direction, remote_addr, tx);
    event_bus.publish(Event::NodeConnected(NodeEvent {
        node_id: node_id.to_string(),
        remote_addr: remote_addr.map(|a| a.to_string()),
        timestamp: Utc::now(),
    }));

    let send_id = node_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                OutboundFrame::Text(text) => {
                    debug!("[{}] -> {}", send_id, text);
                    Message::Text(text)
                }
                OutboundFrame::Binary(bytes) => {
                    debug!("[{}] -> {} bytes", send_id, bytes.len());
                    Message::Binary(bytes)
                }
            };
            if let Err(e) = ws_sender.send(message).await {
                error!("[{}] Send error: {}", send_id, e);
                break;
            }
        }
    });

    let recv_id = node_id.clone();
    let recv_router = router.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!("[{}] <- {}", recv_id, text);
                    recv_router.links().touch(&recv_id);
                    recv_router.handle_text(&recv_id, &text).await;
                }
                Ok(Message::Binary(bytes)) => {
                    debug!("[{}] <- {} bytes", recv_id, bytes.len());
                    recv_router.links().touch(&recv_id);
                    recv_router.handle_binary(&recv_id, &bytes).await;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    recv_router.links().touch(&recv_id);
                }
                Ok(Message::Close(frame)) => {
                    info!("[{}] Close frame received: {:?}", recv_id, frame);
                    break;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error!("[{}] WebSocket error: {}", recv_id, e);
                    break;
                }
            }
        }
    });

    match shutdown {
        Some(shutdown) => tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
            _ = shutdown.notified().wait() => {
                info!("[{}] Link closing due to shutdown", node_id);
            }
        },
        None => tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
        },
    }

    router.links().unregister(&node_id);
    router.cleanup_link(&node_id);
    event_bus.publish(Event::NodeDisconnected(NodeEvent {
        node_id: node_id.to_string(),
        remote_addr: remote_addr.map(|a| a.to_string()),
        timestamp: Utc::now(),
    }));
    info!("[{}] Disconnected", node_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_node_id_from_path() {
        assert_eq!(node_id_from_path("/CS1"), NetworkingNodeId::parse("CS1").ok());
        assert_eq!(node_id_from_path("/LC-7/"), NetworkingNodeId::parse("LC-7").ok());
        assert_eq!(node_id_from_path("/"), None);
        assert_eq!(node_id_from_path("/ocpp/CS1"), None);
    }

    #[test]
    fn rejection_carries_status() {
        let response = reject(StatusCode::BAD_REQUEST, "nope");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().as_deref(), Some("nope"));
    }
}
