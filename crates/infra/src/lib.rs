//! Infrastructure layer: the reconciliation core and what it plugs into.
//!
//! - [`reconciler`]: turns gateway deliveries into garage state and status
//!   messages; also hosts the player actions (drive, buy gas, ...).
//! - [`verify`]: pluggable developer-payload verification.
//! - [`store`]: durable slots for the few values that survive a restart.
//! - [`config`]: environment-driven configuration.

pub mod config;
pub mod error;
pub mod reconciler;
pub mod status;
pub mod store;
pub mod verify;

mod actions;

pub use config::{Config, ConfigError};
pub use error::BillingError;
pub use reconciler::{DEFAULT_TANK_UNITS, Readiness, Reconciler};
pub use status::Status;
pub use store::{InMemorySlotStore, JsonFileSlotStore, SlotStore, StoreError};
pub use verify::{AcceptAllVerifier, IssuedPayloadVerifier, PayloadVerifier};
