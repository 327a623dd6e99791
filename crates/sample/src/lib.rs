//! Headless "drive the car, buy gas" session.
//!
//! Wires a [`Reconciler`] to the [`SimulatedGateway`] and plays a scripted
//! sequence of button presses, resolving each purchase flow the way the
//! script says the store would.

use std::sync::Arc;

use drivebill_catalog::{Catalog, ProductMetadata};
use drivebill_events::{Event, Subscription};
use drivebill_garage::GarageEvent;
use drivebill_gateway::{Delivery, FlowOutcome, PluginPhase, SimulatedGateway};
use drivebill_infra::{AcceptAllVerifier, Reconciler, SlotStore};

/// One button press, and how the store answers if it starts a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Drive,
    BuyGas(FlowOutcome),
    Upgrade(FlowOutcome),
    BuyInfiniteGas(FlowOutcome),
}

/// Drive until empty, refuel, fail to upgrade, subscribe, drive forever.
pub fn default_script() -> Vec<Step> {
    vec![
        Step::Drive,
        Step::Drive,
        Step::Drive,
        Step::BuyGas(FlowOutcome::Approve),
        Step::BuyGas(FlowOutcome::ConsumeFails),
        Step::Upgrade(FlowOutcome::Decline),
        Step::Upgrade(FlowOutcome::Approve),
        Step::BuyInfiniteGas(FlowOutcome::Approve),
        Step::BuyGas(FlowOutcome::Approve),
        Step::Drive,
        Step::BuyInfiniteGas(FlowOutcome::Approve),
    ]
}

/// Simulated store front for the built-in catalog, with listing details.
pub fn simulated_store(delivery: Delivery) -> SimulatedGateway {
    SimulatedGateway::new(delivery)
        .with_metadata(
            Catalog::GAS,
            ProductMetadata::new("Gas", "One quarter of a tank", "$0.99"),
        )
        .with_metadata(
            Catalog::PREMIUM,
            ProductMetadata::new("Premium car", "A faster, shinier car", "$4.99"),
        )
        .with_metadata(
            Catalog::INFINITE_GAS,
            ProductMetadata::new("Infinite gas", "Never refuel again", "$1.99 / month"),
        )
}

/// What the player saw after each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub tank_units: u8,
    pub status: Option<String>,
}

pub struct Session<S> {
    gateway: Arc<SimulatedGateway>,
    core: Reconciler<Arc<SimulatedGateway>, S, AcceptAllVerifier>,
    events: Subscription<GarageEvent>,
}

impl<S: SlotStore> Session<S> {
    pub fn new(
        catalog: Catalog,
        store: S,
        tank_slot: &str,
    ) -> Result<Self, drivebill_infra::StoreError> {
        let delivery = Delivery::new();
        let gateway = Arc::new(simulated_store(delivery.clone()));
        let core = Reconciler::new(
            catalog,
            Arc::clone(&gateway),
            store,
            AcceptAllVerifier,
            &delivery,
            tank_slot,
        )?;
        let events = core.subscribe_events();

        Ok(Self {
            gateway,
            core,
            events,
        })
    }

    /// Initialize billing and apply the restore. Returns whether billing is
    /// usable.
    pub fn boot(&mut self, public_key: &str) -> bool {
        self.core.start(public_key);
        self.gateway.complete_setup();
        self.settle();

        for entry in self.core.catalog().entries() {
            if let Some(detail) = self.core.product_detail(entry.sku.as_str()) {
                tracing::info!(sku = %entry.sku, detail = %detail.trim_end().replace('\n', " | "), "listing");
            }
        }
        self.gateway.phase() == PluginPhase::Idle
    }

    pub fn play(&mut self, step: Step) -> StepReport {
        self.core.dismiss_status();

        let started = match step {
            Step::Drive => {
                self.core.drive();
                None
            }
            Step::BuyGas(outcome) => self.core.buy_gas().then_some(outcome),
            Step::Upgrade(outcome) => self.core.upgrade().then_some(outcome),
            Step::BuyInfiniteGas(outcome) => self.core.buy_infinite_gas().then_some(outcome),
        };
        if let Some(outcome) = started {
            self.gateway.complete_purchase(outcome);
        }
        self.settle();

        StepReport {
            step,
            tank_units: self.core.garage().tank_units(),
            status: self.core.status().map(ToString::to_string),
        }
    }

    pub fn core(&self) -> &Reconciler<Arc<SimulatedGateway>, S, AcceptAllVerifier> {
        &self.core
    }

    /// Apply deliveries, finish any restore consume, log garage events.
    fn settle(&mut self) {
        self.core.tick();
        if self.gateway.phase() == PluginPhase::ConsumeRestore {
            self.gateway.complete_consume();
        }
        for event in self.events.drain() {
            tracing::info!(event_type = event.event_type(), "garage changed");
        }
    }
}
