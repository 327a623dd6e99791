//! `drivebill-gateway`: the boundary to the native billing library.
//!
//! **Responsibility:** everything that crosses between the game and the
//! platform billing SDK.
//!
//! - [`BillingGateway`]: calls *into* the native layer (purchase, restore
//!   queries, product metadata).
//! - [`wire`]: the comma-delimited result format the native layer sends back.
//! - [`Delivery`]: the inbound boundary; decodes each message once and queues
//!   it for the reconciliation core.
//! - [`SimulatedGateway`]: an in-process stand-in for the native plugin, used
//!   by tests and the sample binary.

pub mod delivery;
pub mod gateway;
pub mod simulated;
pub mod wire;

pub use delivery::{Delivered, Delivery};
pub use gateway::{BillingGateway, InitParams};
pub use simulated::{FlowOutcome, PluginPhase, SimulatedGateway};
pub use wire::{GatewayMessage, PurchaseResult, WireError};
