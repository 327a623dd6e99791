//! Garage domain module (entitlement state, event-sourced).
//!
//! Tank level, premium car and infinite-fuel subscription, implemented purely
//! as deterministic domain logic (no IO, no gateway, no storage).

pub mod garage;

pub use garage::{
    AddFuel, Drive, Drove, FuelAdded, Garage, GarageCommand, GarageEvent, GrantInfiniteFuel,
    GrantPremium, InfiniteFuelGranted, LoadTank, PremiumGranted, TANK_MAX, TankLoaded,
};
