use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use drivebill_core::{DomainError, Sku};

/// How a purchase of this product affects the garage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// Bought repeatedly; each purchase is consumed into one unit of fuel.
    Consumable,
    /// One-time purchase unlocking a permanent feature (premium car).
    Entitlement,
    /// Recurring purchase granting ongoing access (infinite fuel).
    Subscription,
}

impl ProductKind {
    /// Whether the gateway must consume the purchase after it succeeds.
    pub fn is_consumable(self) -> bool {
        self == ProductKind::Consumable
    }

    /// Position in the restore sequence: entitlements, then subscriptions,
    /// then consumables (a restored subscription fills the tank before any
    /// unconsumed fuel is counted).
    pub fn restore_order(self) -> u8 {
        match self {
            ProductKind::Entitlement => 0,
            ProductKind::Subscription => 1,
            ProductKind::Consumable => 2,
        }
    }
}

impl core::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ProductKind::Consumable => "consumable",
            ProductKind::Entitlement => "entitlement",
            ProductKind::Subscription => "subscription",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub sku: Sku,
    pub kind: ProductKind,
}

impl CatalogEntry {
    pub fn new(sku: Sku, kind: ProductKind) -> Self {
        Self { sku, kind }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog has no products")]
    Empty,
    #[error("duplicate sku in catalog: {0}")]
    DuplicateSku(Sku),
    #[error("invalid sku: {0}")]
    InvalidSku(#[from] DomainError),
    #[error("malformed catalog document: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    products: Vec<CatalogEntry>,
}

/// The set of products this app sells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub const GAS: &'static str = "gas";
    pub const PREMIUM: &'static str = "premium";
    pub const INFINITE_GAS: &'static str = "infinite_gas";

    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.sku.clone()) {
                return Err(CatalogError::DuplicateSku(entry.sku.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The sample's three products: fuel, the premium car, infinite fuel.
    pub fn trivial_drive() -> Self {
        let entry = |sku: &'static str, kind| CatalogEntry {
            sku: Sku::from_static(sku),
            kind,
        };
        Self {
            entries: vec![
                entry(Self::GAS, ProductKind::Consumable),
                entry(Self::PREMIUM, ProductKind::Entitlement),
                entry(Self::INFINITE_GAS, ProductKind::Subscription),
            ],
        }
    }

    /// Parse `{"products": [{"sku": "gas", "kind": "consumable"}, ...]}`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        Self::new(doc.products)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, sku: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.sku.as_str() == sku)
    }

    pub fn kind_of(&self, sku: &str) -> Option<ProductKind> {
        self.get(sku).map(|e| e.kind)
    }

    /// First product of the given kind, in catalog order.
    pub fn first_of(&self, kind: ProductKind) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    /// Entries ordered for the restore sequence (stable within a kind).
    pub fn restore_sequence(&self) -> Vec<&CatalogEntry> {
        let mut ordered: Vec<&CatalogEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|e| e.kind.restore_order());
        ordered
    }

    /// SKUs the gateway registers as in-app items (consumables + entitlements).
    pub fn in_app_skus(&self) -> Vec<Sku> {
        self.entries
            .iter()
            .filter(|e| e.kind != ProductKind::Subscription)
            .map(|e| e.sku.clone())
            .collect()
    }

    /// SKUs the gateway registers as subscriptions.
    pub fn subscription_skus(&self) -> Vec<Sku> {
        self.entries
            .iter()
            .filter(|e| e.kind == ProductKind::Subscription)
            .map(|e| e.sku.clone())
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::trivial_drive()
    }
}
