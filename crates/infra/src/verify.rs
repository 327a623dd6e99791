//! Developer-payload verification.
//!
//! A payload is attached to each purchase request and echoed back in the
//! result. The verifier decides whether an echoed payload is acceptable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

pub trait PayloadVerifier: Send + Sync {
    /// Payload to attach to a new purchase of `sku`.
    fn issue(&self, sku: &str) -> String;

    /// Whether a successful result for `sku` carrying `payload` may be applied.
    fn verify(&self, sku: &str, payload: &str) -> bool;

    /// Forget a payload whose request never reached the gateway.
    fn discard(&self, _payload: &str) {}
}

impl<V> PayloadVerifier for Arc<V>
where
    V: PayloadVerifier + ?Sized,
{
    fn issue(&self, sku: &str) -> String {
        (**self).issue(sku)
    }

    fn verify(&self, sku: &str, payload: &str) -> bool {
        (**self).verify(sku, payload)
    }

    fn discard(&self, payload: &str) {
        (**self).discard(payload)
    }
}

/// Issues empty payloads and accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

impl PayloadVerifier for AcceptAllVerifier {
    fn issue(&self, _sku: &str) -> String {
        String::new()
    }

    fn verify(&self, _sku: &str, _payload: &str) -> bool {
        true
    }
}

/// Issues a fresh random payload per request and redeems each one once.
///
/// A result is accepted only if its payload was issued by this verifier for
/// the same SKU and has not been redeemed yet, which rejects replays.
#[derive(Debug, Default)]
pub struct IssuedPayloadVerifier {
    outstanding: Mutex<HashMap<String, String>>,
}

impl IssuedPayloadVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads issued but not yet redeemed or discarded.
    pub fn outstanding(&self) -> usize {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PayloadVerifier for IssuedPayloadVerifier {
    fn issue(&self, sku: &str) -> String {
        // simple form: hex only, never contains the wire delimiter
        let payload = Uuid::now_v7().simple().to_string();
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(payload.clone(), sku.to_string());
        payload
    }

    fn verify(&self, sku: &str, payload: &str) -> bool {
        let mut outstanding = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match outstanding.get(payload) {
            Some(issued_for) if issued_for == sku => {
                outstanding.remove(payload);
                true
            }
            Some(issued_for) => {
                tracing::warn!(sku, issued_for = %issued_for, "payload issued for another product");
                false
            }
            None => false,
        }
    }

    fn discard(&self, payload: &str) {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_accepts_anything() {
        let verifier = AcceptAllVerifier;
        assert_eq!(verifier.issue("gas"), "");
        assert!(verifier.verify("gas", ""));
        assert!(verifier.verify("premium", "whatever"));
    }

    #[test]
    fn issued_payload_redeems_exactly_once() {
        let verifier = IssuedPayloadVerifier::new();
        let payload = verifier.issue("gas");
        assert!(!payload.contains(','));
        assert_eq!(verifier.outstanding(), 1);

        assert!(verifier.verify("gas", &payload));
        assert!(!verifier.verify("gas", &payload));
        assert_eq!(verifier.outstanding(), 0);
    }

    #[test]
    fn payload_for_another_sku_is_rejected_and_kept() {
        let verifier = IssuedPayloadVerifier::new();
        let payload = verifier.issue("gas");

        assert!(!verifier.verify("premium", &payload));
        assert!(verifier.verify("gas", &payload));
    }

    #[test]
    fn unknown_and_discarded_payloads_fail() {
        let verifier = IssuedPayloadVerifier::new();
        assert!(!verifier.verify("gas", ""));

        let payload = verifier.issue("gas");
        verifier.discard(&payload);
        assert!(!verifier.verify("gas", &payload));
    }
}
