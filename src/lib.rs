//! # WWCP Core
//!
//! Model of an e-mobility roaming network and the overlay network its
//! nodes use to talk to each other.
//!
//! ## Architecture
//!
//! - **domain**: identifiers, status schedules, result types and the
//!   roaming network aggregates
//! - **application**: the event bus
//! - **overlay**: JSON and binary framing, routing, WebSocket transport
//! - **config**: TOML configuration
//! - **server**: node runtime (startup, uplink, graceful shutdown)

pub mod application;
pub mod config;
pub mod domain;
pub mod overlay;
pub mod server;
pub mod support;

pub use application::events::{create_event_bus, Event, EventBus, SharedEventBus};
pub use config::{config_path_from_env, default_config_path, AppConfig};
pub use server::{init_tracing, NodeHandle};
