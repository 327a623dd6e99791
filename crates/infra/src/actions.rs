//! Player actions: the sample screen's buttons, minus rendering.
//!
//! Each action either changes the garage directly (driving) or starts a
//! purchase flow through the same request path the reconciler guards.

use chrono::Utc;

use drivebill_catalog::ProductKind;
use drivebill_core::DomainError;
use drivebill_garage::{Drive, GarageCommand};
use drivebill_gateway::BillingGateway;

use crate::error::BillingError;
use crate::reconciler::Reconciler;
use crate::status::Status;
use crate::store::SlotStore;
use crate::verify::PayloadVerifier;

impl<G, S, V> Reconciler<G, S, V>
where
    G: BillingGateway,
    S: SlotStore,
    V: PayloadVerifier,
{
    /// Burn one unit of fuel. Returns whether the car moved.
    pub fn drive(&mut self) -> bool {
        let command = GarageCommand::Drive(Drive {
            occurred_at: Utc::now(),
        });
        match self.run(command) {
            Ok(_) => {
                self.status = Some(Status::Drove);
                true
            }
            Err(DomainError::OutOfFuel) => {
                self.status = Some(Status::OutOfGas);
                false
            }
            Err(err) => {
                self.report(BillingError::Domain(err));
                false
            }
        }
    }

    /// Buy one unit of fuel. Returns whether a purchase flow was started.
    pub fn buy_gas(&mut self) -> bool {
        if self.garage.has_infinite_fuel() {
            self.status = Some(Status::AlreadyInfinite);
            return false;
        }
        if self.garage.is_tank_full() {
            self.status = Some(Status::TankFull);
            return false;
        }
        let Some(sku) = self.sku_of(ProductKind::Consumable) else {
            return false;
        };

        let payload = self.verifier.issue(&sku);
        self.request_purchase(&sku, true, &payload)
    }

    /// Buy the premium car. Does nothing once premium is owned.
    pub fn upgrade(&mut self) -> bool {
        if self.garage.has_premium() {
            return false;
        }
        let Some(sku) = self.sku_of(ProductKind::Entitlement) else {
            return false;
        };

        let payload = self.verifier.issue(&sku);
        self.request_purchase(&sku, false, &payload)
    }

    /// Subscribe to infinite fuel, or open the storefront to manage an
    /// existing subscription. Returns whether a purchase flow was started.
    pub fn buy_infinite_gas(&mut self) -> bool {
        if self.garage.has_infinite_fuel() {
            self.gateway.open_storefront();
            self.status = Some(Status::ManagingSubscription);
            return false;
        }
        let Some(sku) = self.sku_of(ProductKind::Subscription) else {
            return false;
        };

        let payload = self.verifier.issue(&sku);
        self.request_subscription_purchase(&sku, &payload)
    }

    pub fn dismiss_status(&mut self) {
        self.status = None;
    }

    fn sku_of(&mut self, kind: ProductKind) -> Option<String> {
        let sku = self.catalog.first_of(kind).map(|entry| entry.sku.to_string());
        if sku.is_none() {
            self.report(BillingError::UnknownProduct {
                sku: format!("<{kind}>"),
            });
        }
        sku
    }
}
