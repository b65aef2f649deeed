//! Change notifications for store mutations.
//!
//! A presentation layer can subscribe instead of re-listing the store after
//! every call. Events are sent only after the backing file has been written.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(SubscriptionConfig::default());
//! store.add("E1", [("Name", "Ana"), ("Salary", "1000")])?;
//!
//! match handle.recv()? {
//!     StoreEvent::Added { key } => println!("added {key}"),
//!     _ => {}
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
