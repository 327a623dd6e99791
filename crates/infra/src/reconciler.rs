//! Purchase-result reconciliation (application-level orchestration).
//!
//! The reconciler owns the garage and is the only thing that mutates it. It
//! composes the injected collaborators: a [`BillingGateway`] to start flows,
//! a [`SlotStore`] for the durable tank level, and a [`PayloadVerifier`].
//!
//! ## Delivery Flow
//!
//! ```text
//! gateway callback (any thread)
//!   ↓
//! Delivery::send: decode once into GatewayMessage, queue it
//!   ↓
//! Reconciler::tick (update loop): drain the queue in arrival order
//!   ↓
//! on_init / on_purchase_result: validate, pick a garage command
//!   ↓
//! execute: garage.handle + garage.apply
//!   ↓
//! persist tank level (if it changed), publish garage events, set status
//! ```
//!
//! ## Failure Handling
//!
//! Nothing here is fatal. Every failure becomes a [`BillingError`], is logged,
//! and is turned into a [`Status`] for the player. Store write failures are
//! logged at `error` and do not roll back the in-memory state.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use drivebill_catalog::{Catalog, CatalogEntry, ProductKind, ProductMetadata};
use drivebill_core::{AggregateRoot, DomainError, RequestId, Sku};
use drivebill_events::{Event, EventBus, InMemoryEventBus, Subscription, execute};
use drivebill_garage::{
    AddFuel, Garage, GarageCommand, GarageEvent, GrantInfiniteFuel, GrantPremium, LoadTank,
    TANK_MAX,
};
use drivebill_gateway::{
    BillingGateway, Delivered, Delivery, GatewayMessage, InitParams, PurchaseResult,
};

use crate::error::BillingError;
use crate::status::Status;
use crate::store::{SlotStore, StoreError};
use crate::verify::PayloadVerifier;

/// Tank level for a player with nothing persisted yet.
pub const DEFAULT_TANK_UNITS: i64 = 2;

/// A purchase request waiting for its result.
#[derive(Debug, Clone)]
struct PendingRequest {
    request_id: RequestId,
    /// Payload issued for this request; released if the purchase is declined.
    payload: String,
}

/// Where the gateway is in its startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// `start` has not been called.
    NotStarted,
    /// `initialize` was called; waiting for the init message.
    Initializing,
    Ready,
    /// The init message reported failure. Purchase requests are refused.
    Unavailable,
}

/// Reconciliation core.
///
/// Single-threaded: every method takes `&mut self` and runs on the caller's
/// update loop. Only the [`Delivery`] handle it subscribed to is shared with
/// other threads.
///
/// ## Generic Parameters
///
/// - `G`: billing gateway
/// - `S`: durable slot store
/// - `V`: payload verifier
pub struct Reconciler<G, S, V> {
    pub(crate) catalog: Catalog,
    pub(crate) gateway: G,
    store: S,
    pub(crate) verifier: V,
    pub(crate) garage: Garage,
    inbox: Subscription<Delivered>,
    events: InMemoryEventBus<GarageEvent>,
    in_flight: HashMap<String, PendingRequest>,
    details: BTreeMap<Sku, ProductMetadata>,
    readiness: Readiness,
    pub(crate) status: Option<Status>,
}

impl<G, S, V> Reconciler<G, S, V>
where
    G: BillingGateway,
    S: SlotStore,
    V: PayloadVerifier,
{
    /// Build the core and load the tank level from `tank_slot`.
    ///
    /// Subscribes to `delivery` immediately so no message published after
    /// this call is missed. Persisted values outside `[0, TANK_MAX]` are
    /// clamped; a missing slot starts at [`DEFAULT_TANK_UNITS`].
    pub fn new(
        catalog: Catalog,
        gateway: G,
        store: S,
        verifier: V,
        delivery: &Delivery,
        tank_slot: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let tank_slot = tank_slot.into();
        let persisted = store.load(&tank_slot)?;

        let mut reconciler = Self {
            catalog,
            gateway,
            store,
            verifier,
            garage: Garage::empty(tank_slot),
            inbox: delivery.subscribe(),
            events: InMemoryEventBus::new(),
            in_flight: HashMap::new(),
            details: BTreeMap::new(),
            readiness: Readiness::NotStarted,
            status: None,
        };

        let units = persisted.unwrap_or(DEFAULT_TANK_UNITS);
        let load = GarageCommand::LoadTank(LoadTank {
            units,
            occurred_at: Utc::now(),
        });
        if let Err(err) = reconciler.run(load) {
            tracing::error!(error = %err, units, "failed to load tank level");
        }
        tracing::info!(
            slot = %reconciler.garage.id(),
            persisted = ?persisted,
            tank = reconciler.garage.tank_units(),
            "reconciler ready"
        );

        Ok(reconciler)
    }

    /// Hand the catalog to the gateway. The outcome arrives later as an init
    /// message.
    pub fn start(&mut self, public_key: &str) {
        let params = InitParams {
            public_key: public_key.to_string(),
            in_app_skus: self.catalog.in_app_skus(),
            subscription_skus: self.catalog.subscription_skus(),
        };
        tracing::info!(
            in_app = %params.in_app_list(),
            subscriptions = %params.subscription_list(),
            "initializing billing gateway"
        );
        self.readiness = Readiness::Initializing;
        self.gateway.initialize(&params);
    }

    /// Drain queued deliveries and apply them in arrival order. Returns how
    /// many were processed.
    pub fn tick(&mut self) -> usize {
        let deliveries = self.inbox.drain();
        if deliveries.is_empty() {
            return 0;
        }
        tracing::debug!(count = deliveries.len(), "draining gateway deliveries");

        let count = deliveries.len();
        for delivered in deliveries {
            match delivered {
                Ok(GatewayMessage::Init { success }) => self.on_init(success),
                Ok(GatewayMessage::Purchase(result)) => self.on_purchase_result(result),
                Err(err) => self.report(BillingError::Malformed(err)),
            }
        }
        count
    }

    /// Apply the gateway's init result.
    ///
    /// On success, owned purchases are restored (entitlements, then
    /// subscriptions, then unconsumed consumables) and product metadata is
    /// cached. On failure the garage is left untouched.
    pub fn on_init(&mut self, success: bool) {
        if !success {
            self.readiness = Readiness::Unavailable;
            self.report(BillingError::GatewayUnavailable);
            return;
        }

        self.readiness = Readiness::Ready;
        tracing::info!(
            subscriptions = self.gateway.supports_subscriptions(),
            "billing gateway ready; restoring purchases"
        );
        self.restore();
        self.cache_details();
    }

    /// Apply one purchase result.
    pub fn on_purchase_result(&mut self, result: PurchaseResult) {
        match self.in_flight.remove(&result.product_id) {
            Some(pending) => {
                tracing::debug!(
                    request_id = %pending.request_id,
                    sku = %result.product_id,
                    "purchase request settled"
                );
                if !result.success {
                    self.verifier.discard(&pending.payload);
                }
            }
            None => tracing::warn!(
                sku = %result.product_id,
                success = result.success,
                "purchase result with no request in flight"
            ),
        }

        match self.reconcile(&result) {
            Ok(status) => {
                tracing::info!(sku = %result.product_id, status = %status, "purchase applied");
                self.status = Some(status);
            }
            Err(err) => self.report(err),
        }
    }

    /// Start a purchase flow. Returns whether the gateway accepted the
    /// request; the result itself arrives later.
    pub fn request_purchase(&mut self, sku: &str, consumable: bool, payload: &str) -> bool {
        self.request(sku, payload, |gateway| {
            gateway.purchase(sku, consumable, payload)
        })
    }

    /// Start a subscription flow. Same contract as [`Self::request_purchase`].
    pub fn request_subscription_purchase(&mut self, sku: &str, payload: &str) -> bool {
        self.request(sku, payload, |gateway| {
            gateway.purchase_subscription(sku, payload)
        })
    }

    pub fn garage(&self) -> &Garage {
        &self.garage
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// The last outcome shown to the player, if not dismissed.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn is_in_flight(&self, sku: &str) -> bool {
        self.in_flight.contains_key(sku)
    }

    /// Cached metadata, available after a successful init.
    pub fn product_metadata(&self, sku: &str) -> Option<&ProductMetadata> {
        self.details.get(sku)
    }

    /// `title\ndescription\nprice\n`, or `None` before metadata is cached.
    pub fn product_detail(&self, sku: &str) -> Option<String> {
        self.product_metadata(sku).map(ProductMetadata::detail_text)
    }

    /// Garage events applied from now on.
    pub fn subscribe_events(&self) -> Subscription<GarageEvent> {
        self.events.subscribe()
    }

    /// Execute a garage command, then persist and publish what it produced.
    pub(crate) fn run(&mut self, command: GarageCommand) -> Result<Vec<GarageEvent>, DomainError> {
        let events = execute(&mut self.garage, &command)?;

        if events.iter().any(GarageEvent::changes_tank) {
            self.persist_tank();
        }
        for event in &events {
            tracing::debug!(
                event_type = event.event_type(),
                version = self.garage.version(),
                tank = self.garage.tank_units(),
                "garage event applied"
            );
            if let Err(err) = self.events.publish(event.clone()) {
                tracing::warn!(error = %err, "failed to publish garage event");
            }
        }
        Ok(events)
    }

    pub(crate) fn report(&mut self, err: BillingError) {
        tracing::warn!(error = %err, "billing outcome not applied");
        self.status = Some(Status::from(&err));
    }

    fn request<F>(&mut self, sku: &str, payload: &str, start: F) -> bool
    where
        F: FnOnce(&G) -> bool,
    {
        let refused = if self.readiness == Readiness::Unavailable {
            Some(BillingError::GatewayUnavailable)
        } else if self.in_flight.contains_key(sku) {
            Some(BillingError::AlreadyInFlight {
                sku: sku.to_string(),
            })
        } else if !start(&self.gateway) {
            Some(BillingError::RequestRejected {
                sku: sku.to_string(),
            })
        } else {
            None
        };

        if let Some(err) = refused {
            self.verifier.discard(payload);
            self.report(err);
            return false;
        }

        let request_id = RequestId::new();
        tracing::info!(%request_id, sku, "purchase request accepted");
        self.in_flight.insert(
            sku.to_string(),
            PendingRequest {
                request_id,
                payload: payload.to_string(),
            },
        );
        true
    }

    fn reconcile(&mut self, result: &PurchaseResult) -> Result<Status, BillingError> {
        let sku = &result.product_id;
        if !result.success {
            return Err(BillingError::PurchaseDeclined { sku: sku.clone() });
        }
        if !self.verifier.verify(sku, &result.payload) {
            return Err(BillingError::VerificationFailed { sku: sku.clone() });
        }
        let Some(entry) = self.catalog.get(sku).cloned() else {
            return Err(BillingError::UnknownProduct { sku: sku.clone() });
        };

        Ok(self.grant(&entry)?)
    }

    fn grant(&mut self, entry: &CatalogEntry) -> Result<Status, DomainError> {
        let sku = entry.sku.clone();
        let occurred_at = Utc::now();

        let status = match entry.kind {
            ProductKind::Consumable => {
                self.run(GarageCommand::AddFuel(AddFuel { sku, occurred_at }))?;
                Status::TankFilled {
                    units: self.garage.tank_units(),
                    max: TANK_MAX,
                }
            }
            ProductKind::Entitlement => {
                self.run(GarageCommand::GrantPremium(GrantPremium { sku, occurred_at }))?;
                Status::Upgraded
            }
            ProductKind::Subscription => {
                self.run(GarageCommand::GrantInfiniteFuel(GrantInfiniteFuel {
                    sku,
                    occurred_at,
                }))?;
                Status::Subscribed
            }
        };
        Ok(status)
    }

    fn restore(&mut self) {
        let sequence: Vec<CatalogEntry> =
            self.catalog.restore_sequence().into_iter().cloned().collect();

        for entry in sequence {
            let consumable = entry.kind.is_consumable();
            if !self
                .gateway
                .query_purchase_state(entry.sku.as_str(), consumable)
            {
                continue;
            }

            tracing::info!(sku = %entry.sku, kind = %entry.kind, "restoring purchase");
            match self.grant(&entry) {
                // Only a recovered unit of fuel is worth telling the player about.
                Ok(status) if consumable => self.status = Some(status),
                Ok(_) => {}
                Err(err) => self.report(BillingError::Domain(err)),
            }
        }
    }

    fn cache_details(&mut self) {
        for entry in self.catalog.entries() {
            match self.gateway.product_metadata(entry.sku.as_str()) {
                Some(metadata) => {
                    self.details.insert(entry.sku.clone(), metadata);
                }
                None => tracing::debug!(sku = %entry.sku, "no metadata for product"),
            }
        }
    }

    fn persist_tank(&self) {
        let slot = self.garage.id();
        let units = i64::from(self.garage.tank_units());
        if let Err(err) = self.store.save(slot, units) {
            tracing::error!(error = %err, slot = %slot, units, "failed to persist tank level");
        }
    }
}

impl<G, S, V> core::fmt::Debug for Reconciler<G, S, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reconciler")
            .field("garage", &self.garage)
            .field("readiness", &self.readiness)
            .field("in_flight", &self.in_flight)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
