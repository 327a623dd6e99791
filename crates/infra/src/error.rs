//! Failure taxonomy for billing outcomes.
//!
//! None of these are fatal and none are returned to callers: the reconciler
//! logs each one and turns it into a [`crate::Status`] for the player.

use thiserror::Error;

use drivebill_core::DomainError;
use drivebill_gateway::WireError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// The gateway reported that initialization failed.
    #[error("billing gateway unavailable")]
    GatewayUnavailable,

    /// The gateway refused to start the purchase flow.
    #[error("gateway rejected purchase request for {sku}")]
    RequestRejected { sku: String },

    /// The delivered result said the purchase did not go through.
    #[error("purchase of {sku} was declined")]
    PurchaseDeclined { sku: String },

    /// The developer payload did not pass verification.
    #[error("payload verification failed for {sku}")]
    VerificationFailed { sku: String },

    /// The SKU is not in the catalog.
    #[error("unknown product {sku}")]
    UnknownProduct { sku: String },

    /// A purchase of this SKU is already waiting for its result.
    #[error("purchase of {sku} already in flight")]
    AlreadyInFlight { sku: String },

    /// A delivery could not be decoded.
    #[error("malformed gateway message: {0}")]
    Malformed(#[from] WireError),

    /// The garage refused the state change.
    #[error("state change rejected: {0}")]
    Domain(#[from] DomainError),
}
