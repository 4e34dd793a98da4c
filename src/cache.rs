//! Directory listing cache.
//!
//! Keys are a one-way hash over storage identity and the folder path
//! normalized to a trailing slash, so trailing-slash variants of the same
//! folder hash identically across all call sites. The store itself is
//! pluggable; [`MemoryListingCache`] is the bundled implementation. No TTL
//! is applied here, expiry policy belongs to the underlying store.

use std::collections::HashMap;
use std::sync::Mutex;

use sha1::{Digest, Sha1};

use crate::types::DavEntry;

/// Key-value store for cached folder listings. `get`/`set`/`remove` are
/// each assumed atomic; sequences of them are not.
pub trait ListingCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<DavEntry>>;
    fn set(&self, key: &str, listing: Vec<DavEntry>);
    fn remove(&self, key: &str);
}

/// Cache key for a folder path within a storage.
pub fn listing_cache_key(storage_id: &str, path: &str) -> String {
    let normalized = format!("{}/", path.trim_matches('/'));
    let mut hasher = Sha1::new();
    hasher.update(storage_id.as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// In-memory listing cache, suitable as the default store and for tests.
#[derive(Default)]
pub struct MemoryListingCache {
    entries: Mutex<HashMap<String, Vec<DavEntry>>>,
}

impl MemoryListingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListingCache for MemoryListingCache {
    fn get(&self, key: &str) -> Option<Vec<DavEntry>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, listing: Vec<DavEntry>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), listing);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
