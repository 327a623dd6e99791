//! The one human-readable line the player sees after each outcome.

use crate::error::BillingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    BillingUnavailable,
    TankFilled { units: u8, max: u8 },
    Upgraded,
    Subscribed,
    ProductNotFound(String),
    PurchaseDeclined(String),
    VerificationFailed(String),
    RequestRejected(String),
    AlreadyInFlight(String),
    UnreadableMessage,
    OutOfGas,
    Drove,
    TankFull,
    AlreadyInfinite,
    ManagingSubscription,
    Failed(String),
}

impl Status {
    /// Whether this status reports something that did not happen.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Status::BillingUnavailable
                | Status::ProductNotFound(_)
                | Status::PurchaseDeclined(_)
                | Status::VerificationFailed(_)
                | Status::RequestRejected(_)
                | Status::AlreadyInFlight(_)
                | Status::UnreadableMessage
                | Status::OutOfGas
                | Status::Failed(_)
        )
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Status::BillingUnavailable => {
                f.write_str("Billing unavailable: in-app billing failed to initialize.")
            }
            Status::TankFilled { units, max } => write!(f, "Tank filled to {units}/{max}."),
            Status::Upgraded => f.write_str("Upgraded to premium. Thank you!"),
            Status::Subscribed => f.write_str("Subscribed to infinite gas. Thank you!"),
            Status::ProductNotFound(sku) => write!(f, "Product not found: {sku}"),
            Status::PurchaseDeclined(sku) => write!(f, "Purchase of {sku} was not completed."),
            Status::VerificationFailed(sku) => {
                write!(f, "Purchase of {sku} could not be verified.")
            }
            Status::RequestRejected(sku) => write!(f, "Could not start purchase of {sku}."),
            Status::AlreadyInFlight(sku) => {
                write!(f, "A purchase of {sku} is already in progress.")
            }
            Status::UnreadableMessage => f.write_str("Received an unreadable billing message."),
            Status::OutOfGas => f.write_str("Oh, no! You are out of gas! Try buying some!"),
            Status::Drove => f.write_str("Vroooom, you drove a few miles."),
            Status::TankFull => f.write_str("Your tank is full. Drive around a bit!"),
            Status::AlreadyInfinite => f.write_str(
                "No need! You're subscribed to infinite gas. Isn't that awesome?",
            ),
            Status::ManagingSubscription => {
                f.write_str("Opening the store to manage your subscription.")
            }
            Status::Failed(reason) => write!(f, "Something went wrong: {reason}"),
        }
    }
}

impl From<&BillingError> for Status {
    fn from(err: &BillingError) -> Self {
        match err {
            BillingError::GatewayUnavailable => Status::BillingUnavailable,
            BillingError::RequestRejected { sku } => Status::RequestRejected(sku.clone()),
            BillingError::PurchaseDeclined { sku } => Status::PurchaseDeclined(sku.clone()),
            BillingError::VerificationFailed { sku } => Status::VerificationFailed(sku.clone()),
            BillingError::UnknownProduct { sku } => Status::ProductNotFound(sku.clone()),
            BillingError::AlreadyInFlight { sku } => Status::AlreadyInFlight(sku.clone()),
            BillingError::Malformed(_) => Status::UnreadableMessage,
            BillingError::Domain(err) => Status::Failed(err.to_string()),
        }
    }
}
