use std::sync::Arc;

use drivebill_catalog::ProductMetadata;
use drivebill_core::Sku;

/// Parameters handed to the native layer at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitParams {
    /// Licence key used by the platform to sign purchase data.
    pub public_key: String,
    pub in_app_skus: Vec<Sku>,
    pub subscription_skus: Vec<Sku>,
}

impl InitParams {
    /// In-app SKUs joined with `,`, the shape the native `initPlugin` takes.
    pub fn in_app_list(&self) -> String {
        join(&self.in_app_skus)
    }

    /// Subscription SKUs joined with `,`.
    pub fn subscription_list(&self) -> String {
        join(&self.subscription_skus)
    }
}

fn join(skus: &[Sku]) -> String {
    skus.iter().map(Sku::as_str).collect::<Vec<_>>().join(",")
}

/// Calls into the native billing library.
///
/// Every method returns immediately. `initialize`, `purchase` and
/// `purchase_subscription` finish later: their outcome arrives as a message
/// on the [`crate::Delivery`] the gateway was built with. A `true` return
/// from a purchase call only means the flow was started.
///
/// `query_purchase_state`, `product_metadata` and `supports_subscriptions`
/// answer from data the gateway gathered during `initialize`, so they are
/// only meaningful after a successful init message.
pub trait BillingGateway: Send + Sync {
    fn initialize(&self, params: &InitParams);

    /// Start a purchase of an in-app product. `consumable` asks the gateway to
    /// consume the purchase before reporting success.
    fn purchase(&self, sku: &str, consumable: bool, payload: &str) -> bool;

    fn purchase_subscription(&self, sku: &str, payload: &str) -> bool;

    fn supports_subscriptions(&self) -> bool;

    /// Whether the user owns `sku`. For consumables this also starts consuming
    /// the restored purchase.
    fn query_purchase_state(&self, sku: &str, consumable: bool) -> bool;

    fn product_metadata(&self, sku: &str) -> Option<ProductMetadata>;

    /// Open the platform store (used to manage an active subscription).
    fn open_storefront(&self);
}

impl<G> BillingGateway for Arc<G>
where
    G: BillingGateway + ?Sized,
{
    fn initialize(&self, params: &InitParams) {
        (**self).initialize(params)
    }

    fn purchase(&self, sku: &str, consumable: bool, payload: &str) -> bool {
        (**self).purchase(sku, consumable, payload)
    }

    fn purchase_subscription(&self, sku: &str, payload: &str) -> bool {
        (**self).purchase_subscription(sku, payload)
    }

    fn supports_subscriptions(&self) -> bool {
        (**self).supports_subscriptions()
    }

    fn query_purchase_state(&self, sku: &str, consumable: bool) -> bool {
        (**self).query_purchase_state(sku, consumable)
    }

    fn product_metadata(&self, sku: &str) -> Option<ProductMetadata> {
        (**self).product_metadata(sku)
    }

    fn open_storefront(&self) {
        (**self).open_storefront()
    }
}
