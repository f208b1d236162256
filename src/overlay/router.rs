//! Overlay router
//!
//! Sends requests towards other nodes and correlates their responses,
//! forwards messages addressed to other nodes and hands local requests to a
//! [`RequestHandler`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::binary::{BinaryFrameError, BinaryMessage, BinaryRequestMessage, BinaryResponseMessage};
use super::error_code::ErrorCode;
use super::handler::RequestHandler;
use super::json::{Addressing, JsonErrorMessage, JsonMessage, JsonRequestMessage, JsonResponseMessage};
use super::node_id::{NetworkPath, NetworkingNodeId, RequestId};
use super::registry::{OutboundFrame, SharedLinkRegistry};

/// Default time to wait for a response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors of requests sent through the overlay
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("No route to node {0}")]
    NoRoute(NetworkingNodeId),

    #[error("Failed to send: {0}")]
    SendFailed(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{code}: {description}")]
    Remote {
        code: ErrorCode,
        description: String,
        details: Value,
    },

    #[error(transparent)]
    Encoding(#[from] BinaryFrameError),
}

impl RequestError {
    fn kind(&self) -> &'static str {
        match self {
            Self::NoRoute(_) => "no_route",
            Self::SendFailed(_) => "send_failed",
            Self::Timeout => "timeout",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Remote { .. } => "remote_error",
            Self::Encoding(_) => "encoding",
        }
    }
}

#[derive(Debug)]
enum Reply {
    Json(Value),
    Binary(Vec<u8>),
}

/// Pending request waiting for a response
struct PendingRequest {
    action: String,
    via: NetworkingNodeId,
    response_sender: oneshot::Sender<Result<Reply, RequestError>>,
}

pub struct OverlayRouter {
    local_id: NetworkingNodeId,
    links: SharedLinkRegistry,
    handler: Arc<dyn RequestHandler>,
    routes: DashMap<NetworkingNodeId, NetworkingNodeId>,
    default_route: RwLock<Option<NetworkingNodeId>>,
    pending_requests: DashMap<RequestId, PendingRequest>,
    request_counter: AtomicU64,
    request_timeout: Duration,
}

/// Thread-safe router
pub type SharedOverlayRouter = Arc<OverlayRouter>;

impl OverlayRouter {
    pub fn new(
        local_id: NetworkingNodeId,
        links: SharedLinkRegistry,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        Self {
            local_id,
            links,
            handler,
            routes: DashMap::new(),
            default_route: RwLock::new(None),
            pending_requests: DashMap::new(),
            request_counter: AtomicU64::new(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn local_id(&self) -> &NetworkingNodeId {
        &self.local_id
    }

    pub fn links(&self) -> &SharedLinkRegistry {
        &self.links
    }

    // ── Routing table ──────────────────────────────────────

    /// Reach `destination` through the neighbour `via`.
    pub fn add_route(&self, destination: NetworkingNodeId, via: NetworkingNodeId) {
        info!(destination = %destination, via = %via, "Route added");
        self.routes.insert(destination, via);
    }

    pub fn remove_route(&self, destination: &NetworkingNodeId) -> Option<NetworkingNodeId> {
        self.routes.remove(destination).map(|(_, via)| via)
    }

    pub fn set_default_route(&self, via: Option<NetworkingNodeId>) {
        info!(via = ?via.as_ref().map(|v| v.to_string()), "Default route set");
        *self.default_route.write() = via;
    }

    pub fn default_route(&self) -> Option<NetworkingNodeId> {
        self.default_route.read().clone()
    }

    pub fn routes(&self) -> Vec<(NetworkingNodeId, NetworkingNodeId)> {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        routes.sort();
        routes
    }

    /// Next hop towards `destination`: a direct link, a static route or the
    /// default route, in that order.
    pub fn next_hop(&self, destination: &NetworkingNodeId) -> Option<NetworkingNodeId> {
        if self.links.is_connected(destination) {
            return Some(destination.clone());
        }
        if let Some(via) = self.routes.get(destination) {
            if self.links.is_connected(via.value()) {
                return Some(via.value().clone());
            }
        }
        self.default_route()
            .filter(|via| self.links.is_connected(via))
    }

    // ── Outgoing requests ──────────────────────────────────

    fn generate_request_id(&self) -> RequestId {
        let n = self.request_counter.fetch_add(1, Ordering::SeqCst);
        RequestId::new(format!("{}-{}", self.local_id, n))
    }

    /// Send a JSON request to `destination` and wait for its response payload.
    pub async fn send_request(
        &self,
        destination: &NetworkingNodeId,
        action: &str,
        payload: Value,
    ) -> Result<Value, RequestError> {
        let request = JsonRequestMessage::overlay(
            destination.clone(),
            NetworkPath::from_source(self.local_id.clone()),
            self.generate_request_id(),
            action,
            payload,
        );
        let request_id = request.request_id.clone();
        let frame = OutboundFrame::Text(JsonMessage::from(request).serialize());

        match self.dispatch(destination, action, request_id, frame).await? {
            Reply::Json(payload) => Ok(payload),
            Reply::Binary(_) => Err(RequestError::InvalidResponse(
                "binary response to a JSON request".to_string(),
            )),
        }
    }

    /// Send a binary request to `destination` and wait for its response payload.
    pub async fn send_binary_request(
        &self,
        destination: &NetworkingNodeId,
        action: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, RequestError> {
        let request = BinaryRequestMessage::new(
            destination.clone(),
            NetworkPath::from_source(self.local_id.clone()),
            self.generate_request_id(),
            action,
            payload,
        );
        let request_id = request.request_id.clone();
        let frame = OutboundFrame::Binary(request.encode()?);

        match self.dispatch(destination, action, request_id, frame).await? {
            Reply::Binary(payload) => Ok(payload),
            Reply::Json(_) => Err(RequestError::InvalidResponse(
                "JSON response to a binary request".to_string(),
            )),
        }
    }

    async fn dispatch(
        &self,
        destination: &NetworkingNodeId,
        action: &str,
        request_id: RequestId,
        frame: OutboundFrame,
    ) -> Result<Reply, RequestError> {
        let result = self.dispatch_inner(destination, action, request_id, frame).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!(
            "overlay_requests_total",
            "action" => action.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    async fn dispatch_inner(
        &self,
        destination: &NetworkingNodeId,
        action: &str,
        request_id: RequestId,
        frame: OutboundFrame,
    ) -> Result<Reply, RequestError> {
        let via = self
            .next_hop(destination)
            .ok_or_else(|| RequestError::NoRoute(destination.clone()))?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests.insert(
            request_id.clone(),
            PendingRequest {
                action: action.to_string(),
                via: via.clone(),
                response_sender: tx,
            },
        );

        info!(
            destination = %destination,
            via = %via,
            request_id = %request_id,
            action,
            "Sending request"
        );

        if let Err(e) = self.links.send_to(&via, frame) {
            self.pending_requests.remove(&request_id);
            return Err(RequestError::SendFailed(e));
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending_requests.remove(&request_id);
                Err(RequestError::InvalidResponse("Channel closed".to_string()))
            }
            Err(_) => {
                self.pending_requests.remove(&request_id);
                warn!(destination = %destination, request_id = %request_id, action, "Request timed out");
                Err(RequestError::Timeout)
            }
        }
    }

    fn complete(&self, request_id: &RequestId, result: Result<Reply, RequestError>) {
        match self.pending_requests.remove(request_id) {
            Some((_, pending)) => {
                debug!(request_id = %request_id, action = pending.action.as_str(), "Response received");
                let _ = pending.response_sender.send(result);
            }
            None => {
                warn!(request_id = %request_id, "Response for unknown request");
            }
        }
    }

    /// Number of requests waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }

    /// Fail all requests that were sent over a link that went away.
    pub fn cleanup_link(&self, node_id: &NetworkingNodeId) {
        let stale: Vec<RequestId> = self
            .pending_requests
            .iter()
            .filter(|p| &p.value().via == node_id)
            .map(|p| p.key().clone())
            .collect();
        for request_id in stale {
            if let Some((_, pending)) = self.pending_requests.remove(&request_id) {
                let _ = pending
                    .response_sender
                    .send(Err(RequestError::SendFailed(format!("Link to {} closed", node_id))));
            }
        }
    }

    // ── Incoming frames ────────────────────────────────────

    /// Process a text frame received from the neighbour `from`.
    pub async fn handle_text(&self, from: &NetworkingNodeId, text: &str) {
        let message = match JsonMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(from = %from, error = %e, "Dropping malformed JSON message");
                if let Some(request_id) = salvage_request_id(text) {
                    let error = JsonErrorMessage::new(
                        request_id,
                        ErrorCode::FormationViolation,
                        e.to_string(),
                    );
                    self.reply(from, OutboundFrame::Text(JsonMessage::from(error).serialize()));
                }
                return;
            }
        };

        if self.is_for_other_node(message.destination(), message.addressing()) {
            self.forward_json(from, message);
            return;
        }

        match message {
            JsonMessage::Request(request) => self.answer_json(from, request).await,
            JsonMessage::Response(response) => {
                self.complete(&response.request_id, Ok(Reply::Json(response.payload)))
            }
            JsonMessage::Error(error) => self.complete(
                &error.request_id,
                Err(RequestError::Remote {
                    code: error.error_code,
                    description: error.error_description,
                    details: error.error_details,
                }),
            ),
        }
    }

    /// Process a binary frame received from the neighbour `from`.
    pub async fn handle_binary(&self, from: &NetworkingNodeId, frame: &[u8]) {
        let message = match BinaryMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(from = %from, error = %e, bytes = frame.len(), "Dropping malformed binary message");
                return;
            }
        };

        if self.is_for_other_node(message.destination(), Addressing::Overlay) {
            self.forward_binary(from, message);
            return;
        }

        match message {
            BinaryMessage::Request(request) => self.answer_binary(from, request).await,
            BinaryMessage::Response(response) => {
                self.complete(&response.request_id, Ok(Reply::Binary(response.payload)))
            }
        }
    }

    fn is_for_other_node(&self, destination: &NetworkingNodeId, addressing: Addressing) -> bool {
        addressing == Addressing::Overlay
            && !destination.is_zero()
            && destination != &self.local_id
    }

    async fn answer_json(&self, from: &NetworkingNodeId, request: JsonRequestMessage) {
        let source = request.network_path.source().unwrap_or(from).clone();
        let reply: JsonMessage = match self
            .handler
            .handle_request(&source, &request.action, request.payload.clone())
            .await
        {
            Ok(payload) => JsonResponseMessage::answer(&request, &self.local_id, payload).into(),
            Err(e) => JsonErrorMessage::answer(
                &request.request_id,
                &request.network_path,
                request.addressing,
                &self.local_id,
                e.code,
                e.description,
            )
            .into(),
        };
        self.reply(from, OutboundFrame::Text(reply.serialize()));
    }

    async fn answer_binary(&self, from: &NetworkingNodeId, request: BinaryRequestMessage) {
        let source = request.network_path.source().unwrap_or(from).clone();
        let frame = match self
            .handler
            .handle_binary_request(&source, &request.action, &request.payload)
            .await
            .map(|payload| BinaryResponseMessage::answer(&request, &self.local_id, payload).encode())
        {
            Ok(Ok(bytes)) => OutboundFrame::Binary(bytes),
            Ok(Err(e)) => self.binary_error(&request, ErrorCode::InternalError, e.to_string()),
            Err(e) => self.binary_error(&request, e.code, e.description),
        };
        self.reply(from, frame);
    }

    /// Binary requests are answered with a JSON error message on failure.
    fn binary_error(
        &self,
        request: &BinaryRequestMessage,
        code: ErrorCode,
        description: String,
    ) -> OutboundFrame {
        let error = JsonErrorMessage::answer(
            &request.request_id,
            &request.network_path,
            Addressing::Overlay,
            &self.local_id,
            code,
            description,
        );
        OutboundFrame::Text(JsonMessage::from(error).serialize())
    }

    fn forward_json(&self, from: &NetworkingNodeId, message: JsonMessage) {
        let destination = message.destination().clone();
        match self.forwarding_hop(from, &destination, message.network_path()) {
            Some(via) => {
                debug!(destination = %destination, via = %via, "Forwarding JSON message");
                let forwarded = message.forwarded_by(&self.local_id);
                if let Err(e) = self.links.send_to(&via, OutboundFrame::Text(forwarded.serialize())) {
                    warn!(destination = %destination, error = e.as_str(), "Forwarding failed");
                }
            }
            None => {
                warn!(destination = %destination, from = %from, "No route, dropping JSON message");
                if let JsonMessage::Request(request) = message {
                    let error = JsonErrorMessage::answer(
                        &request.request_id,
                        &request.network_path,
                        Addressing::Overlay,
                        &self.local_id,
                        ErrorCode::NetworkError,
                        format!("No route to node {}", destination),
                    );
                    self.reply(from, OutboundFrame::Text(JsonMessage::from(error).serialize()));
                }
            }
        }
    }

    fn forward_binary(&self, from: &NetworkingNodeId, message: BinaryMessage) {
        let destination = message.destination().clone();
        let Some(via) = self.forwarding_hop(from, &destination, message.network_path()) else {
            warn!(destination = %destination, from = %from, "No route, dropping binary message");
            if let BinaryMessage::Request(request) = &message {
                let frame = self.binary_error(
                    request,
                    ErrorCode::NetworkError,
                    format!("No route to node {}", destination),
                );
                self.reply(from, frame);
            }
            return;
        };

        match message.forwarded_by(&self.local_id).encode() {
            Ok(bytes) => {
                debug!(destination = %destination, via = %via, "Forwarding binary message");
                if let Err(e) = self.links.send_to(&via, OutboundFrame::Binary(bytes)) {
                    warn!(destination = %destination, error = e.as_str(), "Forwarding failed");
                }
            }
            Err(e) => warn!(destination = %destination, error = %e, "Cannot re-encode forwarded message"),
        }
    }

    /// Next hop for a message in transit; refuses loops and bouncing the
    /// message back to the neighbour it came from.
    fn forwarding_hop(
        &self,
        from: &NetworkingNodeId,
        destination: &NetworkingNodeId,
        path: &NetworkPath,
    ) -> Option<NetworkingNodeId> {
        if path.contains(&self.local_id) {
            warn!(path = %path, "Routing loop detected");
            return None;
        }
        self.next_hop(destination).filter(|via| via != from)
    }

    fn reply(&self, to: &NetworkingNodeId, frame: OutboundFrame) {
        if let Err(e) = self.links.send_to(to, frame) {
            warn!(to = %to, error = e.as_str(), "Failed to send reply");
        }
    }
}

/// Request id of a message that failed to parse, if one can be found.
fn salvage_request_id(text: &str) -> Option<RequestId> {
    let value: Value = serde_json::from_str(text).ok()?;
    let arr = value.as_array()?;
    if arr.first()?.as_u64()? != super::json::MSG_TYPE_REQUEST {
        return None;
    }
    let index = if matches!(arr.get(2), Some(Value::Array(_))) { 3 } else { 1 };
    arr.get(index)?.as_str().map(RequestId::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::handler::HandlerError;
    use crate::overlay::registry::{LinkDirection, LinkRegistry};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct EchoHandler;

    #[async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle_request(
            &self,
            source: &NetworkingNodeId,
            action: &str,
            payload: Value,
        ) -> Result<Value, HandlerError> {
            match action {
                "Echo" => Ok(json!({"from": source.as_str(), "payload": payload})),
                other => Err(HandlerError::not_implemented(other)),
            }
        }
    }

    fn node(id: &str) -> NetworkingNodeId {
        NetworkingNodeId::parse(id).unwrap()
    }

    fn router(local: &str) -> Arc<OverlayRouter> {
        Arc::new(
            OverlayRouter::new(node(local), LinkRegistry::shared(), Arc::new(EchoHandler))
                .with_request_timeout(Duration::from_millis(200)),
        )
    }

    fn connect(router: &OverlayRouter, peer: &str) -> mpsc::UnboundedReceiver<OutboundFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        router
            .links()
            .register(node(peer), LinkDirection::Inbound, None, tx);
        rx
    }

    fn text(frame: OutboundFrame) -> JsonMessage {
        match frame {
            OutboundFrame::Text(text) => JsonMessage::parse(&text).unwrap(),
            other => panic!("Expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn answers_local_standard_request() {
        let r = router("CSMS");
        let mut rx = connect(&r, "CS1");

        r.handle_text(&node("CS1"), r#"[2,"1","Echo",{"x":1}]"#).await;

        match text(rx.try_recv().unwrap()) {
            JsonMessage::Response(resp) => {
                assert_eq!(resp.addressing, Addressing::Standard);
                assert_eq!(resp.request_id.as_str(), "1");
                assert_eq!(resp.payload, json!({"from": "CS1", "payload": {"x": 1}}));
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn answers_unknown_actions_with_errors() {
        let r = router("CSMS");
        let mut rx = connect(&r, "LC1");

        r.handle_text(&node("LC1"), r#"[2,"CSMS",["CS1","LC1"],"9","Reset",{}]"#)
            .await;

        match text(rx.try_recv().unwrap()) {
            JsonMessage::Error(err) => {
                assert_eq!(err.error_code, ErrorCode::NotImplemented);
                assert_eq!(err.destination, node("CS1"));
                assert_eq!(err.network_path, NetworkPath::from_source(node("CSMS")));
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_request_gets_formation_violation() {
        let r = router("CSMS");
        let mut rx = connect(&r, "CS1");

        r.handle_text(&node("CS1"), r#"[2,"5","Echo"]"#).await;
        match text(rx.try_recv().unwrap()) {
            JsonMessage::Error(err) => {
                assert_eq!(err.request_id.as_str(), "5");
                assert_eq!(err.error_code, ErrorCode::FormationViolation);
            }
            other => panic!("Expected error, got {:?}", other),
        }

        r.handle_text(&node("CS1"), "garbage").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forwards_and_appends_local_id() {
        let r = router("LC1");
        let _from = connect(&r, "CS1");
        let mut upstream = connect(&r, "CSMS");

        r.handle_text(&node("CS1"), r#"[2,"CSMS",["CS1"],"1","Echo",{}]"#)
            .await;

        let forwarded = text(upstream.try_recv().unwrap());
        assert_eq!(forwarded.destination(), &node("CSMS"));
        let hops: Vec<_> = forwarded.network_path().iter().map(|n| n.to_string()).collect();
        assert_eq!(hops, vec!["CS1", "LC1"]);
    }

    #[tokio::test]
    async fn unroutable_request_gets_network_error() {
        let r = router("LC1");
        let mut from = connect(&r, "CS1");

        r.handle_text(&node("CS1"), r#"[2,"CSMS",["CS1"],"1","Echo",{}]"#)
            .await;

        match text(from.try_recv().unwrap()) {
            JsonMessage::Error(err) => assert_eq!(err.error_code, ErrorCode::NetworkError),
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn loops_are_dropped() {
        let r = router("LC1");
        let mut from = connect(&r, "CS1");
        let mut upstream = connect(&r, "CSMS");

        r.handle_text(&node("CS1"), r#"[3,"CSMS",["LC1","CS1"],"1",{}]"#)
            .await;
        assert!(upstream.try_recv().is_err());
        assert!(from.try_recv().is_err());
    }

    #[tokio::test]
    async fn default_route_is_used_for_unknown_destinations() {
        let r = router("LC1");
        let mut upstream = connect(&r, "HUB");
        r.set_default_route(Some(node("HUB")));

        assert_eq!(r.next_hop(&node("FAR")), Some(node("HUB")));
        r.add_route(node("FAR"), node("GONE"));
        assert_eq!(r.next_hop(&node("FAR")), Some(node("HUB")));

        r.handle_binary(
            &node("CS1"),
            &BinaryRequestMessage::new(
                node("FAR"),
                NetworkPath::from_source(node("CS1")),
                "1".into(),
                "Echo",
                vec![1, 2],
            )
            .encode()
            .unwrap(),
        )
        .await;

        match upstream.try_recv().unwrap() {
            OutboundFrame::Binary(bytes) => {
                let forwarded = BinaryMessage::decode(&bytes).unwrap();
                assert_eq!(forwarded.network_path().last(), Some(&node("LC1")));
            }
            other => panic!("Expected binary frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn request_response_correlation() {
        let r = router("CS1");
        let mut link = connect(&r, "CSMS");

        let sender = r.clone();
        let call = tokio::spawn(async move {
            sender
                .send_request(&node("CSMS"), "Echo", json!({"n": 1}))
                .await
        });

        let request = match text(link.recv().await.unwrap()) {
            JsonMessage::Request(request) => request,
            other => panic!("Expected request, got {:?}", other),
        };
        assert_eq!(request.network_path.source(), Some(&node("CS1")));
        assert_eq!(r.pending_count(), 1);

        let response = JsonResponseMessage::answer(&request, &node("CSMS"), json!({"ok": true}));
        r.handle_text(&node("CSMS"), &JsonMessage::from(response).serialize())
            .await;

        assert_eq!(call.await.unwrap().unwrap(), json!({"ok": true}));
        assert_eq!(r.pending_count(), 0);
    }

    #[tokio::test]
    async fn remote_errors_and_timeouts() {
        let r = router("CS1");
        let mut link = connect(&r, "CSMS");

        let sender = r.clone();
        let call = tokio::spawn(async move {
            sender.send_request(&node("CSMS"), "Reset", json!({})).await
        });
        let request = match text(link.recv().await.unwrap()) {
            JsonMessage::Request(request) => request,
            other => panic!("Expected request, got {:?}", other),
        };
        let error = JsonErrorMessage::answer(
            &request.request_id,
            &request.network_path,
            Addressing::Overlay,
            &node("CSMS"),
            ErrorCode::NotSupported,
            "no",
        );
        r.handle_text(&node("CSMS"), &JsonMessage::from(error).serialize())
            .await;
        assert!(matches!(
            call.await.unwrap(),
            Err(RequestError::Remote { code: ErrorCode::NotSupported, .. })
        ));

        let timed_out = r.send_request(&node("CSMS"), "Echo", json!({})).await;
        assert_eq!(timed_out, Err(RequestError::Timeout));
        assert_eq!(r.pending_count(), 0);

        let unroutable = r.send_request(&node("NOWHERE"), "Echo", json!({})).await;
        assert_eq!(unroutable, Err(RequestError::NoRoute(node("NOWHERE"))));
    }

    #[tokio::test]
    async fn binary_request_roundtrip_and_link_cleanup() {
        let r = router("CS1");
        let mut link = connect(&r, "CSMS");

        let sender = r.clone();
        let call = tokio::spawn(async move {
            sender
                .send_binary_request(&node("CSMS"), "Echo", vec![9, 9])
                .await
        });
        let request = match link.recv().await.unwrap() {
            OutboundFrame::Binary(bytes) => BinaryRequestMessage::decode(&bytes).unwrap(),
            other => panic!("Expected binary frame, got {:?}", other),
        };
        let response = BinaryResponseMessage::answer(&request, &node("CSMS"), vec![7]);
        r.handle_binary(&node("CSMS"), &response.encode().unwrap()).await;
        assert_eq!(call.await.unwrap().unwrap(), vec![7]);

        let sender = r.clone();
        let pending = tokio::spawn(async move {
            sender.send_request(&node("CSMS"), "Echo", json!({})).await
        });
        let _ = link.recv().await.unwrap();
        r.cleanup_link(&node("CSMS"));
        assert!(matches!(
            pending.await.unwrap(),
            Err(RequestError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn binary_handler_errors_come_back_as_json() {
        let r = router("CSMS");
        let mut rx = connect(&r, "CS1");

        let request = BinaryRequestMessage::new(
            node("CSMS"),
            NetworkPath::from_source(node("CS1")),
            "3".into(),
            "Echo",
            vec![],
        );
        r.handle_binary(&node("CS1"), &request.encode().unwrap()).await;

        match text(rx.try_recv().unwrap()) {
            JsonMessage::Error(err) => {
                assert_eq!(err.error_code, ErrorCode::NotImplemented);
                assert_eq!(err.request_id.as_str(), "3");
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }
}
