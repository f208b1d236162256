//! Application services shared by the domain and the overlay runtime

pub mod events;

pub use events::{create_event_bus, Event, EventBus, EventSubscriber, SharedEventBus};
