use std::sync::Arc;
use std::thread;

use drivebill_catalog::{Catalog, ProductMetadata};
use drivebill_gateway::{Delivery, FlowOutcome, PluginPhase, SimulatedGateway};
use drivebill_infra::{
    AcceptAllVerifier, InMemorySlotStore, IssuedPayloadVerifier, JsonFileSlotStore,
    PayloadVerifier, Readiness, Reconciler, SlotStore, Status,
};

use proptest::prelude::*;

type Core<V> = Reconciler<Arc<SimulatedGateway>, Arc<InMemorySlotStore>, V>;

/// A reconciler wired to a simulated gateway, as the sample binary wires it.
struct Harness<V> {
    delivery: Delivery,
    gateway: Arc<SimulatedGateway>,
    store: Arc<InMemorySlotStore>,
    core: Core<V>,
}

impl<V: PayloadVerifier> Harness<V> {
    fn build(
        store: InMemorySlotStore,
        verifier: V,
        configure: impl FnOnce(SimulatedGateway) -> SimulatedGateway,
    ) -> Self {
        let delivery = Delivery::new();
        let gateway = Arc::new(configure(SimulatedGateway::new(delivery.clone())));
        let store = Arc::new(store);
        let core = Reconciler::new(
            Catalog::trivial_drive(),
            Arc::clone(&gateway),
            Arc::clone(&store),
            verifier,
            &delivery,
            "gas",
        )
        .expect("in-memory store never fails to load");

        Self {
            delivery,
            gateway,
            store,
            core,
        }
    }

    /// Start the gateway, let setup finish, and apply the init message.
    fn boot(mut self) -> Self {
        self.core.start("test-public-key");
        assert!(self.gateway.complete_setup());
        self.core.tick();
        self
    }

    fn persisted_tank(&self) -> Option<i64> {
        self.store.load("gas").unwrap()
    }
}

fn plain(store: InMemorySlotStore) -> Harness<AcceptAllVerifier> {
    Harness::build(store, AcceptAllVerifier, |g| g)
}

#[test]
fn consumable_result_fills_tank_and_persists() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    h.delivery.purchase_message("gas,true,");
    assert_eq!(h.core.tick(), 1);

    assert_eq!(h.core.garage().tank_units(), 3);
    assert_eq!(h.persisted_tank(), Some(3));
    assert_eq!(h.core.status(), Some(&Status::TankFilled { units: 3, max: 4 }));
    assert_eq!(h.core.status().unwrap().to_string(), "Tank filled to 3/4.");
}

#[test]
fn declined_result_changes_nothing_and_names_product() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    h.delivery.purchase_message("premium,false,xyz");
    h.core.tick();

    assert!(!h.core.garage().has_premium());
    assert_eq!(h.core.garage().tank_units(), 2);
    assert_eq!(
        h.core.status(),
        Some(&Status::PurchaseDeclined("premium".to_string()))
    );
}

#[test]
fn unknown_product_leaves_flags_unchanged() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    h.delivery.purchase_message("unknown_sku,true,");
    h.core.tick();

    let garage = h.core.garage();
    assert!(!garage.has_premium());
    assert!(!garage.has_infinite_fuel());
    assert_eq!(garage.tank_units(), 2);
    assert_eq!(
        h.core.status().unwrap().to_string(),
        "Product not found: unknown_sku"
    );
}

#[test]
fn failed_init_leaves_state_untouched() {
    let mut h = Harness::build(
        InMemorySlotStore::new().with_slot("gas", 1),
        AcceptAllVerifier,
        SimulatedGateway::with_failing_setup,
    )
    .boot();

    assert_eq!(h.core.readiness(), Readiness::Unavailable);
    assert_eq!(h.core.status(), Some(&Status::BillingUnavailable));
    assert_eq!(h.core.garage().tank_units(), 1);
    assert!(!h.core.garage().has_premium());
    assert_eq!(h.persisted_tank(), Some(1));

    assert!(!h.core.buy_gas());
    assert_eq!(h.core.status(), Some(&Status::BillingUnavailable));
    assert!(h.core.product_detail("gas").is_none());
}

#[test]
fn restored_subscription_fills_persisted_tank() {
    let h = Harness::build(
        InMemorySlotStore::new().with_slot("gas", 3),
        AcceptAllVerifier,
        |g| g.with_owned("infinite_gas", ""),
    )
    .boot();

    assert_eq!(h.core.readiness(), Readiness::Ready);
    assert!(h.core.garage().has_infinite_fuel());
    assert_eq!(h.core.garage().tank_units(), 4);
    assert_eq!(h.persisted_tank(), Some(4));
}

#[test]
fn restore_grants_premium_and_consumes_leftover_fuel() {
    let h = Harness::build(InMemorySlotStore::new(), AcceptAllVerifier, |g| {
        g.with_owned("premium", "").with_owned("gas", "")
    })
    .boot();

    assert!(h.core.garage().has_premium());
    assert_eq!(h.core.garage().tank_units(), 3);
    assert_eq!(h.persisted_tank(), Some(3));
    assert_eq!(h.core.status(), Some(&Status::TankFilled { units: 3, max: 4 }));

    assert_eq!(h.gateway.phase(), PluginPhase::ConsumeRestore);
    assert!(h.gateway.complete_consume());
    assert!(!h.gateway.owns("gas"));
    assert!(h.gateway.owns("premium"));
}

#[test]
fn product_details_are_cached_after_init() {
    let h = Harness::build(InMemorySlotStore::new(), AcceptAllVerifier, |g| {
        g.with_metadata("gas", ProductMetadata::new("Gas", "A quarter tank", "$0.99"))
    });

    assert!(h.core.product_detail("gas").is_none());
    let h = h.boot();

    assert_eq!(
        h.core.product_detail("gas").as_deref(),
        Some("Gas\nA quarter tank\n$0.99\n")
    );
    assert!(h.core.product_detail("premium").is_none());
}

#[test]
fn full_purchase_flow_through_simulated_gateway() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    assert!(h.core.buy_gas());
    assert_eq!(h.gateway.phase(), PluginPhase::ConsumablePurchase);
    assert!(h.gateway.complete_purchase(FlowOutcome::Approve));
    h.core.tick();
    assert_eq!(h.core.garage().tank_units(), 3);

    assert!(h.core.upgrade());
    assert!(h.gateway.complete_purchase(FlowOutcome::Decline));
    h.core.tick();
    assert!(!h.core.garage().has_premium());
    assert!(h.core.status().unwrap().is_failure());

    assert!(h.core.buy_infinite_gas());
    assert!(h.gateway.complete_purchase(FlowOutcome::Approve));
    h.core.tick();
    assert!(h.core.garage().has_infinite_fuel());
    assert_eq!(h.core.garage().tank_units(), 4);
    assert_eq!(h.core.status(), Some(&Status::Subscribed));

    assert!(h.core.drive());
    assert_eq!(h.core.garage().tank_units(), 4);
}

#[test]
fn consume_failure_is_reported_as_decline() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    assert!(h.core.buy_gas());
    h.gateway.complete_purchase(FlowOutcome::ConsumeFails);
    h.core.tick();

    assert_eq!(h.core.garage().tank_units(), 2);
    assert_eq!(
        h.core.status(),
        Some(&Status::PurchaseDeclined("gas".to_string()))
    );
}

#[test]
fn second_request_for_same_sku_is_refused_while_in_flight() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    assert!(h.core.buy_gas());
    assert!(!h.core.buy_gas());
    assert_eq!(
        h.core.status(),
        Some(&Status::AlreadyInFlight("gas".to_string()))
    );

    h.gateway.complete_purchase(FlowOutcome::Approve);
    h.core.tick();
    assert!(!h.core.is_in_flight("gas"));
    assert!(h.core.buy_gas());
}

#[test]
fn gateway_busy_rejects_request() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    assert!(h.core.buy_gas());
    assert!(!h.core.upgrade());
    assert_eq!(
        h.core.status(),
        Some(&Status::RequestRejected("premium".to_string()))
    );
    assert!(!h.core.is_in_flight("premium"));
}

#[test]
fn unsupported_subscription_is_rejected_and_reported_declined() {
    let mut h = Harness::build(
        InMemorySlotStore::new(),
        AcceptAllVerifier,
        SimulatedGateway::without_subscriptions,
    )
    .boot();

    assert!(!h.core.buy_infinite_gas());
    assert_eq!(
        h.core.status(),
        Some(&Status::RequestRejected("infinite_gas".to_string()))
    );

    assert_eq!(h.core.tick(), 1);
    assert!(!h.core.garage().has_infinite_fuel());
    assert_eq!(
        h.core.status(),
        Some(&Status::PurchaseDeclined("infinite_gas".to_string()))
    );
}

#[test]
fn malformed_delivery_is_reported_without_state_change() {
    let mut h = plain(InMemorySlotStore::new()).boot();

    h.delivery.purchase_message("gas,true");
    h.core.tick();

    assert_eq!(h.core.garage().tank_units(), 2);
    assert_eq!(h.core.status(), Some(&Status::UnreadableMessage));
}

#[test]
fn comma_payload_decodes_and_reaches_verifier() {
    let verifier = Arc::new(IssuedPayloadVerifier::new());
    let mut h = Harness::build(InMemorySlotStore::new(), Arc::clone(&verifier), |g| g).boot();

    // Payloads the verifier did not issue never pass, commas or not.
    h.delivery.purchase_message("gas,true,a,b,c");
    h.core.tick();
    assert_eq!(h.core.status(), Some(&Status::VerificationFailed("gas".to_string())));

    let mut h = plain(InMemorySlotStore::new()).boot();
    h.delivery.purchase_message("gas,true,a,b,c");
    h.core.tick();
    assert_eq!(h.core.garage().tank_units(), 3);
}

#[test]
fn replayed_result_is_rejected_by_issuing_verifier() {
    let verifier = Arc::new(IssuedPayloadVerifier::new());
    let mut h = Harness::build(InMemorySlotStore::new(), Arc::clone(&verifier), |g| g).boot();

    assert!(h.core.buy_gas());
    assert_eq!(verifier.outstanding(), 1);
    h.gateway.complete_purchase(FlowOutcome::Approve);
    h.core.tick();
    assert_eq!(h.core.garage().tank_units(), 3);
    assert_eq!(verifier.outstanding(), 0);

    let payload = verifier.issue("gas");
    let body = format!("gas,true,{payload}");
    h.delivery.purchase_message(&body);
    h.delivery.purchase_message(&body);
    h.core.tick();
    assert_eq!(h.core.garage().tank_units(), 4);
    assert_eq!(h.core.status(), Some(&Status::VerificationFailed("gas".to_string())));
}

#[test]
fn rejected_request_discards_issued_payload() {
    let verifier = Arc::new(IssuedPayloadVerifier::new());
    let mut h = Harness::build(InMemorySlotStore::new(), Arc::clone(&verifier), |g| g).boot();

    assert!(h.core.buy_gas());
    assert!(!h.core.upgrade());
    assert_eq!(verifier.outstanding(), 1);
}

#[test]
fn declined_purchases_release_their_payloads() {
    let verifier = Arc::new(IssuedPayloadVerifier::new());
    let mut h = Harness::build(InMemorySlotStore::new(), Arc::clone(&verifier), |g| g).boot();

    for _ in 0..3 {
        assert!(h.core.buy_gas());
        assert_eq!(verifier.outstanding(), 1);
        assert!(h.gateway.complete_purchase(FlowOutcome::Decline));
        h.core.tick();
        assert_eq!(
            h.core.status(),
            Some(&Status::PurchaseDeclined("gas".to_string()))
        );
    }
    assert_eq!(verifier.outstanding(), 0);
    assert_eq!(h.core.garage().tank_units(), 2);
}

#[test]
fn payload_of_declined_purchase_cannot_be_redeemed_later() {
    let verifier = Arc::new(IssuedPayloadVerifier::new());
    let mut h = Harness::build(InMemorySlotStore::new(), Arc::clone(&verifier), |g| g).boot();

    let payload = verifier.issue("gas");
    assert!(h.core.request_purchase("gas", true, &payload));
    assert!(h.gateway.complete_purchase(FlowOutcome::Decline));
    h.core.tick();

    h.delivery.purchase_message(&format!("gas,true,{payload}"));
    h.core.tick();
    assert_eq!(h.core.garage().tank_units(), 2);
    assert_eq!(
        h.core.status(),
        Some(&Status::VerificationFailed("gas".to_string()))
    );
}

#[test]
fn stub_verifier_applies_replays() {
    let mut h = plain(InMemorySlotStore::new().with_slot("gas", 0)).boot();

    h.delivery.purchase_message("gas,true,same");
    h.delivery.purchase_message("gas,true,same");
    h.core.tick();

    assert_eq!(h.core.garage().tank_units(), 2);
}

#[test]
fn deliveries_from_other_threads_apply_on_tick_in_order() {
    let mut h = plain(InMemorySlotStore::new().with_slot("gas", 0)).boot();

    let delivery = h.delivery.clone();
    thread::spawn(move || {
        delivery.purchase_message("gas,true,");
        delivery.purchase_message("premium,true,");
        delivery.purchase_message("infinite_gas,true,");
    })
    .join()
    .unwrap();

    assert_eq!(h.core.garage().tank_units(), 0);
    assert_eq!(h.core.tick(), 3);

    let garage = h.core.garage();
    assert!(garage.has_premium());
    assert!(garage.has_infinite_fuel());
    assert_eq!(garage.tank_units(), 4);
    assert_eq!(h.core.status(), Some(&Status::Subscribed));
}

#[test]
fn tank_level_survives_restart_with_file_store() {
    let path = std::env::temp_dir().join(format!("drivebill-{}.json", uuid::Uuid::now_v7()));

    {
        let delivery = Delivery::new();
        let gateway = SimulatedGateway::new(delivery.clone());
        let store = JsonFileSlotStore::open(&path).unwrap();
        let mut core = Reconciler::new(
            Catalog::trivial_drive(),
            gateway,
            store,
            AcceptAllVerifier,
            &delivery,
            "gas",
        )
        .unwrap();
        delivery.purchase_message("gas,true,");
        core.tick();
        assert_eq!(core.garage().tank_units(), 3);
    }

    let delivery = Delivery::new();
    let core = Reconciler::new(
        Catalog::trivial_drive(),
        SimulatedGateway::new(delivery.clone()),
        JsonFileSlotStore::open(&path).unwrap(),
        AcceptAllVerifier,
        &delivery,
        "gas",
    )
    .unwrap();
    assert_eq!(core.garage().tank_units(), 3);
    assert!(!core.garage().has_premium());

    std::fs::remove_file(&path).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn n_consumable_results_saturate_at_max(initial in 0i64..=4, n in 0usize..10) {
        let mut h = plain(InMemorySlotStore::new().with_slot("gas", initial)).boot();

        for _ in 0..n {
            h.delivery.purchase_message("gas,true,");
        }
        h.core.tick();

        let expected = (initial + n as i64).min(4);
        prop_assert_eq!(i64::from(h.core.garage().tank_units()), expected);
        prop_assert_eq!(h.persisted_tank(), Some(if n == 0 { initial } else { expected }));
    }

    #[test]
    fn infinite_fuel_always_means_full_tank(bodies in prop::collection::vec(
        prop::sample::select(vec![
            "gas,true,",
            "gas,false,",
            "premium,true,",
            "infinite_gas,true,",
            "unknown_sku,true,",
            "gas,true",
        ]),
        0..12,
    ), drives in 0usize..6) {
        let mut h = plain(InMemorySlotStore::new()).boot();

        for body in &bodies {
            h.delivery.purchase_message(body);
            h.core.tick();
            for _ in 0..drives {
                h.core.drive();
            }
            let garage = h.core.garage();
            prop_assert!(garage.tank_units() <= 4);
            if garage.has_infinite_fuel() {
                prop_assert_eq!(garage.tank_units(), 4);
            }
        }
    }
}
