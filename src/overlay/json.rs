//! JSON message framing
//!
//! Messages are JSON arrays whose first element is the message type. Each
//! kind comes in two addressing modes:
//!
//! - **Request**  `[2, "<requestId>", "<action>", {<payload>}]`
//!   or `[2, "<destination>", ["<path>"...], "<requestId>", "<action>", {<payload>}]`
//! - **Response** `[3, "<requestId>", {<payload>}]`
//!   or `[3, "<destination>", ["<path>"...], "<requestId>", {<payload>}]`
//! - **Error**    `[4, "<requestId>", "<code>", "<description>", {<details>}]`
//!   or `[4, "<destination>", ["<path>"...], "<requestId>", "<code>", "<description>", {<details>}]`
//!
//! The overlay form is recognised by its length (two fields longer than the
//! standard form) together with the network path array in position 2. A
//! standard response may carry an array payload in that same position.

use serde_json::Value;
use thiserror::Error;

use super::error_code::ErrorCode;
use super::node_id::{NetworkPath, NetworkingNodeId, RequestId};
use crate::domain::error::IdError;

pub const MSG_TYPE_REQUEST: u64 = 2;
pub const MSG_TYPE_RESPONSE: u64 = 3;
pub const MSG_TYPE_ERROR: u64 = 4;

/// Minimum field counts of the standard forms (error details are optional).
/// Overlay forms add destination and path.
const STANDARD_REQUEST_LEN: usize = 4;
const STANDARD_RESPONSE_LEN: usize = 3;
const STANDARD_ERROR_LEN: usize = 4;

/// Errors that can occur when parsing a JSON message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JsonFrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message is not a JSON array")]
    NotAnArray,

    #[error("Empty message array")]
    EmptyArray,

    #[error("Message type is not a number")]
    InvalidMessageType,

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),

    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },

    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),

    #[error("Invalid node id: {0}")]
    InvalidNodeId(#[from] IdError),
}

/// Whether a message carries destination and network path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    Standard,
    Overlay,
}

// ── Request ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequestMessage {
    pub destination: NetworkingNodeId,
    pub network_path: NetworkPath,
    pub request_id: RequestId,
    pub action: String,
    pub payload: Value,
    pub addressing: Addressing,
}

impl JsonRequestMessage {
    /// A request for the node at the other end of the link.
    pub fn new(request_id: RequestId, action: impl Into<String>, payload: Value) -> Self {
        Self {
            destination: NetworkingNodeId::zero(),
            network_path: NetworkPath::new(),
            request_id,
            action: action.into(),
            payload,
            addressing: Addressing::Standard,
        }
    }

    pub fn overlay(
        destination: NetworkingNodeId,
        network_path: NetworkPath,
        request_id: RequestId,
        action: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            destination,
            network_path,
            request_id,
            action: action.into(),
            payload,
            addressing: Addressing::Overlay,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut arr = vec![Value::from(MSG_TYPE_REQUEST)];
        if self.addressing == Addressing::Overlay {
            push_address(&mut arr, &self.destination, &self.network_path);
        }
        arr.push(Value::String(self.request_id.to_string()));
        arr.push(Value::String(self.action.clone()));
        arr.push(self.payload.clone());
        Value::Array(arr)
    }

    fn from_array(arr: &[Value]) -> Result<Self, JsonFrameError> {
        if is_overlay(arr, STANDARD_REQUEST_LEN) {
            require_len(arr, 6)?;
            let (destination, network_path) = parse_address(arr)?;
            Ok(Self::overlay(
                destination,
                network_path,
                string_at(arr, 3, "requestId must be a string")?.into(),
                string_at(arr, 4, "action must be a string")?,
                arr[5].clone(),
            ))
        } else {
            require_len(arr, STANDARD_REQUEST_LEN)?;
            Ok(Self::new(
                string_at(arr, 1, "requestId must be a string")?.into(),
                string_at(arr, 2, "action must be a string")?,
                arr[3].clone(),
            ))
        }
    }
}

// ── Response ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponseMessage {
    pub destination: NetworkingNodeId,
    pub network_path: NetworkPath,
    pub request_id: RequestId,
    pub payload: Value,
    pub addressing: Addressing,
}

impl JsonResponseMessage {
    pub fn new(request_id: RequestId, payload: Value) -> Self {
        Self {
            destination: NetworkingNodeId::zero(),
            network_path: NetworkPath::new(),
            request_id,
            payload,
            addressing: Addressing::Standard,
        }
    }

    pub fn overlay(
        destination: NetworkingNodeId,
        network_path: NetworkPath,
        request_id: RequestId,
        payload: Value,
    ) -> Self {
        Self {
            destination,
            network_path,
            request_id,
            payload,
            addressing: Addressing::Overlay,
        }
    }

    /// Answer `request` from `local`, in the request's addressing mode.
    pub fn answer(request: &JsonRequestMessage, local: &NetworkingNodeId, payload: Value) -> Self {
        match request.addressing {
            Addressing::Standard => Self::new(request.request_id.clone(), payload),
            Addressing::Overlay => Self::overlay(
                reply_destination(&request.network_path),
                NetworkPath::from_source(local.clone()),
                request.request_id.clone(),
                payload,
            ),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut arr = vec![Value::from(MSG_TYPE_RESPONSE)];
        if self.addressing == Addressing::Overlay {
            push_address(&mut arr, &self.destination, &self.network_path);
        }
        arr.push(Value::String(self.request_id.to_string()));
        arr.push(self.payload.clone());
        Value::Array(arr)
    }

    fn from_array(arr: &[Value]) -> Result<Self, JsonFrameError> {
        if is_overlay(arr, STANDARD_RESPONSE_LEN) {
            require_len(arr, 5)?;
            let (destination, network_path) = parse_address(arr)?;
            Ok(Self::overlay(
                destination,
                network_path,
                string_at(arr, 3, "requestId must be a string")?.into(),
                arr[4].clone(),
            ))
        } else {
            require_len(arr, STANDARD_RESPONSE_LEN)?;
            Ok(Self::new(
                string_at(arr, 1, "requestId must be a string")?.into(),
                arr[2].clone(),
            ))
        }
    }
}

// ── Error ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct JsonErrorMessage {
    pub destination: NetworkingNodeId,
    pub network_path: NetworkPath,
    pub request_id: RequestId,
    pub error_code: ErrorCode,
    pub error_description: String,
    pub error_details: Value,
    pub addressing: Addressing,
}

impl JsonErrorMessage {
    pub fn new(
        request_id: RequestId,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            destination: NetworkingNodeId::zero(),
            network_path: NetworkPath::new(),
            request_id,
            error_code,
            error_description: error_description.into(),
            error_details: empty_object(),
            addressing: Addressing::Standard,
        }
    }

    /// Error answer to `request` from `local`, in the request's addressing mode.
    pub fn answer(
        request_id: &RequestId,
        request_path: &NetworkPath,
        addressing: Addressing,
        local: &NetworkingNodeId,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(request_id.clone(), error_code, error_description);
        if addressing == Addressing::Overlay {
            error.destination = reply_destination(request_path);
            error.network_path = NetworkPath::from_source(local.clone());
            error.addressing = Addressing::Overlay;
        }
        error
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.error_details = details;
        self
    }

    pub fn to_value(&self) -> Value {
        let mut arr = vec![Value::from(MSG_TYPE_ERROR)];
        if self.addressing == Addressing::Overlay {
            push_address(&mut arr, &self.destination, &self.network_path);
        }
        arr.push(Value::String(self.request_id.to_string()));
        arr.push(Value::String(self.error_code.to_string()));
        arr.push(Value::String(self.error_description.clone()));
        arr.push(self.error_details.clone());
        Value::Array(arr)
    }

    fn from_array(arr: &[Value]) -> Result<Self, JsonFrameError> {
        let overlay = is_overlay(arr, STANDARD_ERROR_LEN);
        let offset = if overlay { 2 } else { 0 };
        require_len(arr, STANDARD_ERROR_LEN + offset)?;

        let mut error = Self::new(
            string_at(arr, 1 + offset, "requestId must be a string")?.into(),
            ErrorCode::parse(arr[2 + offset].as_str().unwrap_or("GenericError")),
            arr.get(3 + offset).and_then(|v| v.as_str()).unwrap_or(""),
        );
        error.error_details = arr.get(4 + offset).cloned().unwrap_or_else(empty_object);
        if overlay {
            let (destination, network_path) = parse_address(arr)?;
            error.destination = destination;
            error.network_path = network_path;
            error.addressing = Addressing::Overlay;
        }
        Ok(error)
    }
}

// ── JsonMessage ────────────────────────────────────────────────

/// Any parsed JSON message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonMessage {
    Request(JsonRequestMessage),
    Response(JsonResponseMessage),
    Error(JsonErrorMessage),
}

impl JsonMessage {
    pub fn parse(text: &str) -> Result<Self, JsonFrameError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| JsonFrameError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, JsonFrameError> {
        let arr = value.as_array().ok_or(JsonFrameError::NotAnArray)?;
        let msg_type = arr
            .first()
            .ok_or(JsonFrameError::EmptyArray)?
            .as_u64()
            .ok_or(JsonFrameError::InvalidMessageType)?;

        match msg_type {
            MSG_TYPE_REQUEST => JsonRequestMessage::from_array(arr).map(Self::Request),
            MSG_TYPE_RESPONSE => JsonResponseMessage::from_array(arr).map(Self::Response),
            MSG_TYPE_ERROR => JsonErrorMessage::from_array(arr).map(Self::Error),
            other => Err(JsonFrameError::UnknownMessageType(other)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Request(m) => m.to_value(),
            Self::Response(m) => m.to_value(),
            Self::Error(m) => m.to_value(),
        }
    }

    pub fn serialize(&self) -> String {
        self.to_value().to_string()
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Request(m) => &m.request_id,
            Self::Response(m) => &m.request_id,
            Self::Error(m) => &m.request_id,
        }
    }

    pub fn destination(&self) -> &NetworkingNodeId {
        match self {
            Self::Request(m) => &m.destination,
            Self::Response(m) => &m.destination,
            Self::Error(m) => &m.destination,
        }
    }

    pub fn network_path(&self) -> &NetworkPath {
        match self {
            Self::Request(m) => &m.network_path,
            Self::Response(m) => &m.network_path,
            Self::Error(m) => &m.network_path,
        }
    }

    pub fn addressing(&self) -> Addressing {
        match self {
            Self::Request(m) => m.addressing,
            Self::Response(m) => m.addressing,
            Self::Error(m) => m.addressing,
        }
    }

    /// Copy of this message with `node` appended to the network path; the
    /// copy always uses overlay addressing.
    pub fn forwarded_by(&self, node: &NetworkingNodeId) -> Self {
        let mut message = self.clone();
        let (path, addressing) = match &mut message {
            Self::Request(m) => (&mut m.network_path, &mut m.addressing),
            Self::Response(m) => (&mut m.network_path, &mut m.addressing),
            Self::Error(m) => (&mut m.network_path, &mut m.addressing),
        };
        *path = path.append(node.clone());
        *addressing = Addressing::Overlay;
        message
    }
}

impl From<JsonRequestMessage> for JsonMessage {
    fn from(m: JsonRequestMessage) -> Self {
        Self::Request(m)
    }
}

impl From<JsonResponseMessage> for JsonMessage {
    fn from(m: JsonResponseMessage) -> Self {
        Self::Response(m)
    }
}

impl From<JsonErrorMessage> for JsonMessage {
    fn from(m: JsonErrorMessage) -> Self {
        Self::Error(m)
    }
}

// ── Helpers ────────────────────────────────────────────────────

fn empty_object() -> Value {
    Value::Object(Default::default())
}

fn reply_destination(request_path: &NetworkPath) -> NetworkingNodeId {
    request_path
        .source()
        .cloned()
        .unwrap_or_else(NetworkingNodeId::zero)
}

/// Overlay frames are longer than the standard form and carry the path at 2.
fn is_overlay(arr: &[Value], standard_len: usize) -> bool {
    arr.len() > standard_len && matches!(arr.get(2), Some(Value::Array(_)))
}

fn require_len(arr: &[Value], expected: usize) -> Result<(), JsonFrameError> {
    if arr.len() < expected {
        return Err(JsonFrameError::MissingFields {
            expected,
            got: arr.len(),
        });
    }
    Ok(())
}

fn string_at(arr: &[Value], index: usize, what: &'static str) -> Result<String, JsonFrameError> {
    arr.get(index)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(JsonFrameError::FieldTypeMismatch(what))
}

fn push_address(arr: &mut Vec<Value>, destination: &NetworkingNodeId, path: &NetworkPath) {
    arr.push(Value::String(destination.to_string()));
    arr.push(Value::Array(
        path.iter().map(|n| Value::String(n.to_string())).collect(),
    ));
}

fn parse_address(arr: &[Value]) -> Result<(NetworkingNodeId, NetworkPath), JsonFrameError> {
    let destination = NetworkingNodeId::parse(&string_at(arr, 1, "destination must be a string")?)?;
    let hops = arr
        .get(2)
        .and_then(|v| v.as_array())
        .ok_or(JsonFrameError::FieldTypeMismatch("network path must be an array"))?;
    let path = hops
        .iter()
        .map(|hop| -> Result<NetworkingNodeId, JsonFrameError> {
            let hop = hop
                .as_str()
                .ok_or(JsonFrameError::FieldTypeMismatch("network path entries must be strings"))?;
            Ok(NetworkingNodeId::parse(hop)?)
        })
        .collect::<Result<NetworkPath, JsonFrameError>>()?;
    Ok((destination, path))
}
