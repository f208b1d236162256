//! Domain events
//!
//! Event types that represent facts about what happened in the roaming network.
//! The EventBus implementation lives in `application::events`.

pub mod types;

pub use types::{
    EntityEvent, Event, EventMessage, NodeEvent, StatusChangedEvent, StatusPushedEvent,
    TariffEvent,
};
