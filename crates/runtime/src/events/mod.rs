//! Topic-based event bus for container events.
//!
//! Every peer's container events are published to a topic, and consumers
//! subscribe only to the topics they need.

mod bus;

pub use bus::{Event, EventBus, Topic};
