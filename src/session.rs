//! Runtime selection of the backing file.
//!
//! A caller such as a form-driven UI starts with no file chosen. Until one
//! is bound every store operation fails with [`StoreError::Unbound`] instead
//! of silently doing nothing.

use crate::error::{Result, StoreError};
use crate::store::{Store, StoreConfig};
use crate::types::{Record, RecordPatch};
use tracing::info;

/// Holds at most one bound [`Store`].
#[derive(Default)]
pub struct Session {
    store: Option<Store>,
}

impl Session {
    /// A new, unbound session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize (if needed) and bind the store described by `config`,
    /// replacing any previously bound store.
    pub fn bind(&mut self, config: StoreConfig) -> Result<&Store> {
        // Release the old store, and its lock, before opening: the caller may
        // be re-selecting the same file.
        self.store = None;

        let store = Store::open_or_create(config)?;
        info!(path = ?store.path(), "session bound");
        let store: &Store = self.store.insert(store);
        Ok(store)
    }

    /// Drop the bound store, returning to the unbound state.
    pub fn unbind(&mut self) -> Option<Store> {
        self.store.take()
    }

    pub fn is_bound(&self) -> bool {
        self.store.is_some()
    }

    /// The bound store.
    pub fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or(StoreError::Unbound)
    }

    pub fn list_all(&self) -> Result<Vec<Record>> {
        self.store()?.list_all()
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.store()?.exists(key)
    }

    pub fn add<I, K, V>(&self, key: &str, fields: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.store()?.add(key, fields)
    }

    pub fn update(&self, key: &str, patch: &RecordPatch) -> Result<bool> {
        self.store()?.update(key, patch)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        self.store()?.delete(key)
    }

    pub fn search(&self, query: &str) -> Result<Vec<Record>> {
        self.store()?.search(query)
    }
}
