//! Product catalog (immutable, defined at startup).
//!
//! The catalog tells the reconciliation core what kind of product a SKU is,
//! which in turn decides how a delivered purchase result changes the garage.

pub mod catalog;
pub mod metadata;

pub use catalog::{Catalog, CatalogEntry, CatalogError, ProductKind};
pub use metadata::ProductMetadata;
