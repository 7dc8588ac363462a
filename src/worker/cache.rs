//! Cache generations as seen by the worker.
//!
//! Thin handles over the local store. Every key is a canonical URL string.

use crate::db::{LocalStore, StoreError};

use super::network::FetchResponse;

/// All cache generations.
#[derive(Clone)]
pub struct CacheStorage {
    store: LocalStore,
}

impl CacheStorage {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Open (creating if needed) the named generation.
    pub fn open(&self, name: &str) -> Result<Cache, StoreError> {
        self.store.open_cache(name)?;
        Ok(Cache {
            store: self.store.clone(),
            name: name.to_string(),
        })
    }

    /// Generation names, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.store.cache_names()
    }

    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        self.store.delete_cache(name)
    }

    /// Look `key` up in every generation, in name order; first hit wins.
    pub fn match_any(&self, key: &str) -> Result<Option<FetchResponse>, StoreError> {
        for name in self.keys()? {
            if let Some(response) = self.store.cache_match(&name, key)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// One generation.
#[derive(Clone)]
pub struct Cache {
    store: LocalStore,
    name: String,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn put(&self, key: &str, response: &FetchResponse) -> Result<(), StoreError> {
        self.store.cache_put(&self.name, key, response)
    }

    pub fn get(&self, key: &str) -> Result<Option<FetchResponse>, StoreError> {
        self.store.cache_match(&self.name, key)
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.store.cache_keys(&self.name)
    }
}
