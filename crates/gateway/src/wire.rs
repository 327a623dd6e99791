//! Result messages sent back by the native billing layer.
//!
//! Two delivery methods exist:
//!
//! - `InitMessage` with body `true` or `false`
//! - `PurchaseMessage` with body `<productId>,<true|false>,<payload>`
//!
//! The purchase body has no escaping. Decoding splits on the first two commas
//! only, so a payload containing commas survives intact; a product id
//! containing a comma cannot be represented.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const INIT_MESSAGE: &str = "InitMessage";
pub const PURCHASE_MESSAGE: &str = "PurchaseMessage";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown delivery method {method:?}")]
    UnknownMethod { method: String },

    #[error("expected 3 comma-separated fields, found {found} in {body:?}")]
    MissingFields { found: usize, body: String },

    #[error("empty product id in {body:?}")]
    EmptyProductId { body: String },

    #[error("invalid success flag {value:?}")]
    InvalidFlag { value: String },
}

/// Outcome of a single purchase flow, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub product_id: String,
    pub success: bool,
    /// Developer payload echoed back by the store; empty on failure.
    pub payload: String,
}

impl PurchaseResult {
    pub fn succeeded(product_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            success: true,
            payload: payload.into(),
        }
    }

    pub fn declined(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            success: false,
            payload: String::new(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{},{},{}", self.product_id, self.success, self.payload)
    }

    pub fn decode(body: &str) -> Result<Self, WireError> {
        let fields: Vec<&str> = body.splitn(3, ',').collect();
        let [product_id, flag, payload] = fields.as_slice() else {
            return Err(WireError::MissingFields {
                found: fields.len(),
                body: body.to_string(),
            });
        };
        if product_id.trim().is_empty() {
            return Err(WireError::EmptyProductId {
                body: body.to_string(),
            });
        }
        Ok(Self {
            product_id: product_id.to_string(),
            success: parse_flag(flag)?,
            payload: payload.to_string(),
        })
    }
}

/// A delivered message, decoded once at the delivery boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayMessage {
    Init { success: bool },
    Purchase(PurchaseResult),
}

impl GatewayMessage {
    pub fn decode(method: &str, body: &str) -> Result<Self, WireError> {
        match method {
            INIT_MESSAGE => Ok(GatewayMessage::Init {
                success: parse_flag(body)?,
            }),
            PURCHASE_MESSAGE => Ok(GatewayMessage::Purchase(PurchaseResult::decode(body)?)),
            other => Err(WireError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }

    /// Delivery method name this message travels under.
    pub fn method(&self) -> &'static str {
        match self {
            GatewayMessage::Init { .. } => INIT_MESSAGE,
            GatewayMessage::Purchase(_) => PURCHASE_MESSAGE,
        }
    }

    pub fn encode_body(&self) -> String {
        match self {
            GatewayMessage::Init { success } => success.to_string(),
            GatewayMessage::Purchase(result) => result.encode(),
        }
    }
}

/// Case-insensitive `true`/`false`, surrounding whitespace ignored.
fn parse_flag(value: &str) -> Result<bool, WireError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(WireError::InvalidFlag {
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_consumable_success_with_empty_payload() {
        let result = PurchaseResult::decode("gas,true,").unwrap();
        assert_eq!(result, PurchaseResult::succeeded("gas", ""));
    }

    #[test]
    fn decodes_decline_with_payload() {
        let result = PurchaseResult::decode("premium,false,xyz").unwrap();
        assert_eq!(result.product_id, "premium");
        assert!(!result.success);
        assert_eq!(result.payload, "xyz");
    }

    #[test]
    fn payload_keeps_embedded_commas() {
        let result = PurchaseResult::decode("gas,true,a,b,c").unwrap();
        assert_eq!(result.payload, "a,b,c");
    }

    #[test]
    fn flag_parsing_is_case_insensitive() {
        assert!(PurchaseResult::decode("gas,True,").unwrap().success);
        assert!(!PurchaseResult::decode("gas, FALSE ,").unwrap().success);
        assert_eq!(
            PurchaseResult::decode("gas,yes,"),
            Err(WireError::InvalidFlag {
                value: "yes".to_string()
            })
        );
    }

    #[test]
    fn rejects_truncated_bodies() {
        assert_eq!(
            PurchaseResult::decode("gas,true"),
            Err(WireError::MissingFields {
                found: 2,
                body: "gas,true".to_string()
            })
        );
        assert!(matches!(
            PurchaseResult::decode(""),
            Err(WireError::MissingFields { found: 1, .. })
        ));
        assert!(matches!(
            PurchaseResult::decode(",true,"),
            Err(WireError::EmptyProductId { .. })
        ));
    }

    #[test]
    fn encoding_matches_native_format() {
        assert_eq!(PurchaseResult::declined("infinite_gas").encode(), "infinite_gas,false,");
        assert_eq!(PurchaseResult::succeeded("gas", "p-1").encode(), "gas,true,p-1");
    }

    #[test]
    fn dispatches_on_method_name() {
        assert_eq!(
            GatewayMessage::decode("InitMessage", "false"),
            Ok(GatewayMessage::Init { success: false })
        );
        let msg = GatewayMessage::decode("PurchaseMessage", "gas,true,").unwrap();
        assert_eq!(msg.method(), PURCHASE_MESSAGE);
        assert_eq!(msg.encode_body(), "gas,true,");
        assert!(matches!(
            GatewayMessage::decode("RefundMessage", "gas"),
            Err(WireError::UnknownMethod { .. })
        ));
    }
}
