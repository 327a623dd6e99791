//! `drivebill-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog, the
//! garage aggregate and the reconciliation core (no IO, no gateway concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{RequestId, Sku};
