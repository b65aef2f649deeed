//! # Flat-file Record Store
//!
//! A uniquely keyed record store persisted in a single delimited-text or
//! JSON file. The file is the source of truth: every operation re-reads it,
//! and every mutation writes it back before returning.
//!
//! ## Core Concepts
//!
//! - **Schema**: ordered field names, the first being the unique key
//! - **Formats**: delimited text (CSV-like, append fast path) or a JSON document
//! - **Store**: add/update/delete/search with whole-file rewrite
//! - **Session**: a store chosen at runtime; fails fast while unbound
//! - **Inventory**: products, stock and a sales log built on a store
//!
//! ## Example
//!
//! ```ignore
//! use flatstore::{RecordPatch, Store, StoreConfig};
//!
//! let store = Store::open_or_create(StoreConfig::employees("./staff.csv"))?;
//!
//! assert!(store.add("E1", [("Name", "Ana"), ("Salary", "1000")])?);
//! assert!(!store.add("E1", [("Name", "Bob"), ("Salary", "2000")])?);
//!
//! store.update("E1", &RecordPatch::new().set("Salary", "1500"))?;
//! let hits = store.search("ana")?;
//! store.delete("E1")?;
//! ```

pub mod error;
pub mod formats;
pub mod inventory;
pub mod schema;
pub mod session;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use formats::{DelimitedText, FormatKind, RecordFormat, StructuredDocument};
pub use inventory::{Inventory, Product, ProductSales, Sale, SaleOutcome, SalesLog, SalesReport};
pub use schema::{Schema, CREATED_AT_COLUMN, UPDATED_AT_COLUMN};
pub use session::Session;
pub use store::{Store, StoreConfig};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionManager,
};
pub use types::*;
