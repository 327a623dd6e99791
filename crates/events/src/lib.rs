//! `drivebill-events`: event abstractions and in-process message delivery.
//!
//! - [`Event`]: facts emitted by aggregates.
//! - [`execute`]: decide-then-apply helper for aggregates.
//! - [`EventBus`] / [`InMemoryEventBus`]: fan-out channel used both for
//!   gateway deliveries (inbound) and garage events (outbound).

pub mod bus;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{BusError, InMemoryEventBus};
