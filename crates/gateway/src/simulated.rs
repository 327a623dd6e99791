//! In-process stand-in for the native billing plugin.
//!
//! Mirrors the plugin's own flow control: one flow at a time, consumables are
//! consumed before success is reported, and every outcome is delivered as a
//! message rather than returned. Nothing completes on its own; the driver
//! (a test or the sample binary) decides when setup, purchase and consume
//! flows finish, which makes delivery timing explicit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use drivebill_catalog::ProductMetadata;

use crate::delivery::Delivery;
use crate::gateway::{BillingGateway, InitParams};
use crate::wire::{GatewayMessage, PurchaseResult};

/// Internal state of the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginPhase {
    /// `initialize` has not been called.
    Uninitialized,
    /// Setup and inventory query in progress.
    Initializing,
    /// Ready to start a flow.
    Idle,
    ConsumablePurchase,
    EntitlementPurchase,
    SubscriptionPurchase,
    /// Consuming a consumable found during a restore query.
    ConsumeRestore,
    /// Setup failed; nothing will ever be accepted.
    Unavailable,
}

/// How the store resolves the flow currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The user paid (and, for consumables, the consume succeeded).
    Approve,
    /// The user cancelled or the store refused.
    Decline,
    /// Payment went through but consuming it failed (consumables only;
    /// other kinds treat this like `Approve`).
    ConsumeFails,
}

#[derive(Debug)]
struct PendingFlow {
    sku: String,
    payload: String,
}

#[derive(Debug)]
struct SimState {
    phase: PluginPhase,
    setup_succeeds: bool,
    subscriptions_supported: bool,
    /// Purchases the store knows the user owns (sku → developer payload).
    owned: BTreeMap<String, String>,
    metadata: HashMap<String, ProductMetadata>,
    pending: Option<PendingFlow>,
    init_params: Option<InitParams>,
    storefront_opens: u32,
}

/// Simulated billing plugin.
#[derive(Debug)]
pub struct SimulatedGateway {
    state: Mutex<SimState>,
    delivery: Delivery,
}

impl SimulatedGateway {
    pub fn new(delivery: Delivery) -> Self {
        Self {
            state: Mutex::new(SimState {
                phase: PluginPhase::Uninitialized,
                setup_succeeds: true,
                subscriptions_supported: true,
                owned: BTreeMap::new(),
                metadata: HashMap::new(),
                pending: None,
                init_params: None,
                storefront_opens: 0,
            }),
            delivery,
        }
    }

    /// Seed a purchase the user made in an earlier session.
    pub fn with_owned(self, sku: impl Into<String>, payload: impl Into<String>) -> Self {
        self.lock().owned.insert(sku.into(), payload.into());
        self
    }

    pub fn with_metadata(self, sku: impl Into<String>, metadata: ProductMetadata) -> Self {
        self.lock().metadata.insert(sku.into(), metadata);
        self
    }

    pub fn without_subscriptions(self) -> Self {
        self.lock().subscriptions_supported = false;
        self
    }

    pub fn with_failing_setup(self) -> Self {
        self.lock().setup_succeeds = false;
        self
    }

    pub fn phase(&self) -> PluginPhase {
        self.lock().phase
    }

    pub fn init_params(&self) -> Option<InitParams> {
        self.lock().init_params.clone()
    }

    pub fn owns(&self, sku: &str) -> bool {
        self.lock().owned.contains_key(sku)
    }

    pub fn storefront_opens(&self) -> u32 {
        self.lock().storefront_opens
    }

    /// Finish setup and deliver the init message. Returns `false` if no setup
    /// was in progress.
    pub fn complete_setup(&self) -> bool {
        let success = {
            let mut state = self.lock();
            if state.phase != PluginPhase::Initializing {
                return false;
            }
            state.phase = if state.setup_succeeds {
                PluginPhase::Idle
            } else {
                PluginPhase::Unavailable
            };
            state.setup_succeeds
        };
        self.delivery.deliver(GatewayMessage::Init { success });
        true
    }

    /// Resolve the purchase flow in progress and deliver its result. Returns
    /// `false` if no purchase flow was in progress.
    pub fn complete_purchase(&self, outcome: FlowOutcome) -> bool {
        let result = {
            let mut state = self.lock();
            let phase = state.phase;
            if !matches!(
                phase,
                PluginPhase::ConsumablePurchase
                    | PluginPhase::EntitlementPurchase
                    | PluginPhase::SubscriptionPurchase
            ) {
                return false;
            }
            let Some(flow) = state.pending.take() else {
                state.phase = PluginPhase::Idle;
                return false;
            };
            state.phase = PluginPhase::Idle;

            match (outcome, phase) {
                (FlowOutcome::Decline, _) => PurchaseResult::declined(flow.sku),
                (FlowOutcome::ConsumeFails, PluginPhase::ConsumablePurchase) => {
                    PurchaseResult::declined(flow.sku)
                }
                (_, PluginPhase::ConsumablePurchase) => {
                    // Paid and consumed in one go; never lands in `owned`.
                    PurchaseResult::succeeded(flow.sku, flow.payload)
                }
                _ => {
                    if state.owned.contains_key(&flow.sku) {
                        // The store refuses to sell a non-consumable twice.
                        PurchaseResult::declined(flow.sku)
                    } else {
                        state.owned.insert(flow.sku.clone(), flow.payload.clone());
                        PurchaseResult::succeeded(flow.sku, flow.payload)
                    }
                }
            }
        };
        self.delivery.deliver(GatewayMessage::Purchase(result));
        true
    }

    /// Finish consuming a restored consumable. No message is delivered for
    /// this; the core already counted the unit when the query returned.
    pub fn complete_consume(&self) -> bool {
        let mut state = self.lock();
        if state.phase != PluginPhase::ConsumeRestore {
            return false;
        }
        if let Some(flow) = state.pending.take() {
            state.owned.remove(&flow.sku);
        }
        state.phase = PluginPhase::Idle;
        true
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_flow(&self, phase: PluginPhase, sku: &str, payload: &str) -> bool {
        let mut state = self.lock();
        if state.phase != PluginPhase::Idle {
            return false;
        }
        state.phase = phase;
        state.pending = Some(PendingFlow {
            sku: sku.to_string(),
            payload: payload.to_string(),
        });
        true
    }
}

impl BillingGateway for SimulatedGateway {
    fn initialize(&self, params: &InitParams) {
        let mut state = self.lock();
        tracing::debug!(
            in_app = %params.in_app_list(),
            subscriptions = %params.subscription_list(),
            "simulated gateway initializing"
        );
        state.init_params = Some(params.clone());
        state.phase = PluginPhase::Initializing;
    }

    fn purchase(&self, sku: &str, consumable: bool, payload: &str) -> bool {
        let phase = if consumable {
            PluginPhase::ConsumablePurchase
        } else {
            PluginPhase::EntitlementPurchase
        };
        self.start_flow(phase, sku, payload)
    }

    fn purchase_subscription(&self, sku: &str, payload: &str) -> bool {
        let supported = self.lock().subscriptions_supported;
        if supported && self.start_flow(PluginPhase::SubscriptionPurchase, sku, payload) {
            return true;
        }
        // Refused up front, but the plugin still reports a failed purchase.
        self.delivery
            .deliver(GatewayMessage::Purchase(PurchaseResult::declined(sku)));
        false
    }

    fn supports_subscriptions(&self) -> bool {
        self.lock().subscriptions_supported
    }

    fn query_purchase_state(&self, sku: &str, consumable: bool) -> bool {
        let mut state = self.lock();
        if state.phase != PluginPhase::Idle || !state.owned.contains_key(sku) {
            return false;
        }
        if consumable {
            state.phase = PluginPhase::ConsumeRestore;
            state.pending = Some(PendingFlow {
                sku: sku.to_string(),
                payload: String::new(),
            });
        }
        true
    }

    fn product_metadata(&self, sku: &str) -> Option<ProductMetadata> {
        self.lock().metadata.get(sku).cloned()
    }

    fn open_storefront(&self) {
        self.lock().storefront_opens += 1;
    }
}
