//! Inbound boundary: where the native layer hands results back.
//!
//! The native side calls [`Delivery::send`] with a method name and a string
//! body from whatever thread it runs on. The body is decoded here, once, and
//! the decoded message (or the decode error) is queued on an in-memory bus.
//! The reconciliation core drains that queue from its own update loop.

use std::sync::Arc;

use drivebill_events::{EventBus, InMemoryEventBus, Subscription};

use crate::wire::{GatewayMessage, INIT_MESSAGE, PURCHASE_MESSAGE, WireError};

/// What the core receives per delivery: a decoded message, or why it could
/// not be decoded.
pub type Delivered = Result<GatewayMessage, WireError>;

/// Cheap-to-clone handle shared by the gateway (publisher) and the core
/// (subscriber).
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    bus: Arc<InMemoryEventBus<Delivered>>,
}

impl Delivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<Delivered> {
        self.bus.subscribe()
    }

    /// Raw entry point used by a native bridge: `method` is `InitMessage` or
    /// `PurchaseMessage`, `body` is the string payload.
    pub fn send(&self, method: &str, body: &str) {
        let decoded = GatewayMessage::decode(method, body);
        match &decoded {
            Ok(message) => tracing::debug!(method, body, ?message, "gateway delivery"),
            Err(err) => tracing::warn!(method, body, error = %err, "undecodable gateway delivery"),
        }
        self.publish(decoded);
    }

    /// `onInitResult("true" | "false")`.
    pub fn init_message(&self, body: &str) {
        self.send(INIT_MESSAGE, body)
    }

    /// `onPurchaseResult("<productId>,<true|false>,<payload>")`.
    pub fn purchase_message(&self, body: &str) {
        self.send(PURCHASE_MESSAGE, body)
    }

    /// Typed entry point for in-process gateways. The message still travels
    /// as its wire form so it is decoded exactly like a native delivery.
    pub fn deliver(&self, message: GatewayMessage) {
        self.send(message.method(), &message.encode_body())
    }

    fn publish(&self, delivered: Delivered) {
        // A delivery cannot be handed back to the native layer; log and drop.
        if let Err(err) = self.bus.publish(delivered) {
            tracing::error!(error = %err, "failed to queue gateway delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::PurchaseResult;

    #[test]
    fn raw_bodies_are_decoded_before_queueing() {
        let delivery = Delivery::new();
        let inbox = delivery.subscribe();

        delivery.init_message("true");
        delivery.purchase_message("gas,true,");
        delivery.purchase_message("garbage");

        let queued = inbox.drain();
        assert_eq!(queued.len(), 3);
        assert_eq!(queued[0], Ok(GatewayMessage::Init { success: true }));
        assert_eq!(
            queued[1],
            Ok(GatewayMessage::Purchase(PurchaseResult::succeeded("gas", "")))
        );
        assert!(matches!(queued[2], Err(WireError::MissingFields { .. })));
    }

    #[test]
    fn clones_share_one_queue() {
        let delivery = Delivery::new();
        let inbox = delivery.subscribe();
        let native_side = delivery.clone();

        std::thread::spawn(move || native_side.purchase_message("premium,false,"))
            .join()
            .unwrap();

        assert_eq!(
            inbox.drain(),
            vec![Ok(GatewayMessage::Purchase(PurchaseResult::declined("premium")))]
        );
    }

    #[test]
    fn typed_delivery_round_trips_through_wire_form() {
        let delivery = Delivery::new();
        let inbox = delivery.subscribe();
        let result = PurchaseResult::succeeded("gas", "order=1,token=abc");

        delivery.deliver(GatewayMessage::Purchase(result.clone()));

        assert_eq!(inbox.drain(), vec![Ok(GatewayMessage::Purchase(result))]);
    }
}
