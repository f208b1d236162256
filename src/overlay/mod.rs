//! Overlay networking between WWCP nodes
//!
//! Messages travel over WebSocket links between neighbouring nodes and carry
//! a destination node id plus the path of nodes they passed through.

pub mod binary;
pub mod error_code;
pub mod handler;
pub mod json;
pub mod messages;
pub mod node_id;
pub mod partner;
pub mod registry;
pub mod router;
pub mod server;

pub use binary::{BinaryFrameError, BinaryMessage, BinaryRequestMessage, BinaryResponseMessage};
pub use error_code::ErrorCode;
pub use handler::{HandlerError, RequestHandler, RoamingNetworkHandler};
pub use json::{
    Addressing, JsonErrorMessage, JsonFrameError, JsonMessage, JsonRequestMessage,
    JsonResponseMessage,
};
pub use node_id::{NetworkPath, NetworkingNodeId, RequestId};
pub use partner::OverlayRoamingPartner;
pub use registry::{LinkDirection, LinkRegistry, OutboundFrame, SharedLinkRegistry};
pub use router::{OverlayRouter, RequestError, SharedOverlayRouter};
pub use server::{maintain_uplink, OverlayServer};
