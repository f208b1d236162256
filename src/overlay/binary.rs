//! Binary message framing
//!
//! All integers are big-endian:
//!
//! ```text
//! u8   message type (2 = request, 3 = response)
//! u16  destination length, UTF-8 destination node id
//! u16  path entry count, per entry: u16 length, UTF-8 node id
//! u16  request id length, UTF-8 request id
//! u16  action length, UTF-8 action            (requests only)
//! u32  payload length, payload bytes
//! ```
//!
//! A frame must be consumed completely; trailing bytes are an error.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use thiserror::Error;

use super::node_id::{NetworkPath, NetworkingNodeId, RequestId};
use crate::domain::error::IdError;

pub const MSG_TYPE_REQUEST: u8 = 2;
pub const MSG_TYPE_RESPONSE: u8 = 3;

const MAX_STRING_LEN: usize = u16::MAX as usize;
const MAX_PATH_LEN: usize = u16::MAX as usize;
const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinaryFrameError {
    #[error("Empty frame")]
    Empty,

    #[error("Unexpected end of frame while reading {0}")]
    Truncated(&'static str),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Expected message type {expected}, got {got}")]
    WrongMessageType { expected: u8, got: u8 },

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("{field} too long: {len} > {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("Invalid node id: {0}")]
    InvalidNodeId(#[from] IdError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRequestMessage {
    pub destination: NetworkingNodeId,
    pub network_path: NetworkPath,
    pub request_id: RequestId,
    pub action: String,
    pub payload: Vec<u8>,
}

impl BinaryRequestMessage {
    pub fn new(
        destination: NetworkingNodeId,
        network_path: NetworkPath,
        request_id: RequestId,
        action: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            destination,
            network_path,
            request_id,
            action: action.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, BinaryFrameError> {
        let mut w = FrameWriter::with_capacity(self.payload.len() + 64);
        w.u8(MSG_TYPE_REQUEST);
        w.address(&self.destination, &self.network_path)?;
        w.string("request id", self.request_id.as_str())?;
        w.string("action", &self.action)?;
        w.bytes("payload", &self.payload)?;
        Ok(w.finish())
    }

    pub fn decode(frame: &[u8]) -> Result<Self, BinaryFrameError> {
        let mut r = FrameReader::new(frame)?;
        r.expect_type(MSG_TYPE_REQUEST)?;
        let message = Self::read_body(&mut r)?;
        r.finish()?;
        Ok(message)
    }

    fn read_body(r: &mut FrameReader<'_>) -> Result<Self, BinaryFrameError> {
        let (destination, network_path) = r.address()?;
        Ok(Self {
            destination,
            network_path,
            request_id: r.string("request id")?.into(),
            action: r.string("action")?,
            payload: r.bytes("payload")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResponseMessage {
    pub destination: NetworkingNodeId,
    pub network_path: NetworkPath,
    pub request_id: RequestId,
    pub payload: Vec<u8>,
}

impl BinaryResponseMessage {
    pub fn new(
        destination: NetworkingNodeId,
        network_path: NetworkPath,
        request_id: RequestId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            destination,
            network_path,
            request_id,
            payload,
        }
    }

    /// Answer `request` from `local`.
    pub fn answer(request: &BinaryRequestMessage, local: &NetworkingNodeId, payload: Vec<u8>) -> Self {
        Self::new(
            request
                .network_path
                .source()
                .cloned()
                .unwrap_or_else(NetworkingNodeId::zero),
            NetworkPath::from_source(local.clone()),
            request.request_id.clone(),
            payload,
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, BinaryFrameError> {
        let mut w = FrameWriter::with_capacity(self.payload.len() + 48);
        w.u8(MSG_TYPE_RESPONSE);
        w.address(&self.destination, &self.network_path)?;
        w.string("request id", self.request_id.as_str())?;
        w.bytes("payload", &self.payload)?;
        Ok(w.finish())
    }

    pub fn decode(frame: &[u8]) -> Result<Self, BinaryFrameError> {
        let mut r = FrameReader::new(frame)?;
        r.expect_type(MSG_TYPE_RESPONSE)?;
        let message = Self::read_body(&mut r)?;
        r.finish()?;
        Ok(message)
    }

    fn read_body(r: &mut FrameReader<'_>) -> Result<Self, BinaryFrameError> {
        let (destination, network_path) = r.address()?;
        Ok(Self {
            destination,
            network_path,
            request_id: r.string("request id")?.into(),
            payload: r.bytes("payload")?,
        })
    }
}

/// Any decoded binary message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryMessage {
    Request(BinaryRequestMessage),
    Response(BinaryResponseMessage),
}

impl BinaryMessage {
    pub fn decode(frame: &[u8]) -> Result<Self, BinaryFrameError> {
        let mut r = FrameReader::new(frame)?;
        let message = match r.u8("message type")? {
            MSG_TYPE_REQUEST => Self::Request(BinaryRequestMessage::read_body(&mut r)?),
            MSG_TYPE_RESPONSE => Self::Response(BinaryResponseMessage::read_body(&mut r)?),
            other => return Err(BinaryFrameError::UnknownMessageType(other)),
        };
        r.finish()?;
        Ok(message)
    }

    pub fn encode(&self) -> Result<Vec<u8>, BinaryFrameError> {
        match self {
            Self::Request(m) => m.encode(),
            Self::Response(m) => m.encode(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Request(m) => &m.request_id,
            Self::Response(m) => &m.request_id,
        }
    }

    pub fn destination(&self) -> &NetworkingNodeId {
        match self {
            Self::Request(m) => &m.destination,
            Self::Response(m) => &m.destination,
        }
    }

    pub fn network_path(&self) -> &NetworkPath {
        match self {
            Self::Request(m) => &m.network_path,
            Self::Response(m) => &m.network_path,
        }
    }

    /// Copy of this message with `node` appended to the network path.
    pub fn forwarded_by(&self, node: &NetworkingNodeId) -> Self {
        let mut message = self.clone();
        let path = match &mut message {
            Self::Request(m) => &mut m.network_path,
            Self::Response(m) => &mut m.network_path,
        };
        *path = path.append(node.clone());
        message
    }
}

// ── Writer / reader ────────────────────────────────────────────

struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    fn u32(&mut self, value: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    fn string(&mut self, field: &'static str, value: &str) -> Result<(), BinaryFrameError> {
        let len = checked_len(field, value.len(), MAX_STRING_LEN)?;
        self.u16(len as u16);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn bytes(&mut self, field: &'static str, value: &[u8]) -> Result<(), BinaryFrameError> {
        let len = checked_len(field, value.len(), MAX_PAYLOAD_LEN)?;
        self.u32(len as u32);
        self.buf.extend_from_slice(value);
        Ok(())
    }

    fn address(
        &mut self,
        destination: &NetworkingNodeId,
        path: &NetworkPath,
    ) -> Result<(), BinaryFrameError> {
        self.string("destination", destination.as_str())?;
        let hops = checked_len("network path", path.len(), MAX_PATH_LEN)?;
        self.u16(hops as u16);
        for node in path.iter() {
            self.string("network path entry", node.as_str())?;
        }
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

fn checked_len(field: &'static str, len: usize, max: usize) -> Result<usize, BinaryFrameError> {
    if len > max {
        return Err(BinaryFrameError::FieldTooLong { field, len, max });
    }
    Ok(len)
}

struct FrameReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FrameReader<'a> {
    fn new(frame: &'a [u8]) -> Result<Self, BinaryFrameError> {
        if frame.is_empty() {
            return Err(BinaryFrameError::Empty);
        }
        Ok(Self {
            cursor: Cursor::new(frame),
        })
    }

    fn remaining(&self) -> usize {
        let data: &'a [u8] = *self.cursor.get_ref();
        data.len().saturating_sub(self.cursor.position() as usize)
    }

    fn expect_type(&mut self, expected: u8) -> Result<(), BinaryFrameError> {
        let got = self.u8("message type")?;
        if got != expected {
            return Err(BinaryFrameError::WrongMessageType { expected, got });
        }
        Ok(())
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, BinaryFrameError> {
        self.cursor
            .read_u8()
            .map_err(|_| BinaryFrameError::Truncated(field))
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, BinaryFrameError> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| BinaryFrameError::Truncated(field))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, BinaryFrameError> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| BinaryFrameError::Truncated(field))
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], BinaryFrameError> {
        if self.remaining() < len {
            return Err(BinaryFrameError::Truncated(field));
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    fn string(&mut self, field: &'static str) -> Result<String, BinaryFrameError> {
        let len = self.u16(field)? as usize;
        let raw = self.take(field, len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| BinaryFrameError::InvalidUtf8(field))
    }

    fn bytes(&mut self, field: &'static str) -> Result<Vec<u8>, BinaryFrameError> {
        let len = self.u32(field)? as usize;
        Ok(self.take(field, len)?.to_vec())
    }

    fn address(&mut self) -> Result<(NetworkingNodeId, NetworkPath), BinaryFrameError> {
        let destination = NetworkingNodeId::parse(&self.string("destination")?)?;
        let hops = self.u16("network path")?;
        let mut path = Vec::with_capacity(hops as usize);
        for _ in 0..hops {
            path.push(NetworkingNodeId::parse(&self.string("network path entry")?)?);
        }
        Ok((destination, path.into_iter().collect()))
    }

    fn finish(self) -> Result<(), BinaryFrameError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(BinaryFrameError::TrailingBytes(n)),
        }
    }
}
