//! Caching directory frontend.
//!
//! Answers "what is in this folder" and "what metadata does this entry
//! have" from the listing cache, falling back to a depth-1 PROPFIND on a
//! miss and populating the cache with the parsed result. Metadata for a
//! single entry resolves through its parent folder's listing rather than a
//! dedicated per-resource request, which keeps the request count low for
//! the stat-many-files-in-one-folder pattern.
//!
//! A listing request that fails with a protocol error (e.g. access denied
//! while enumerating) is logged and resolved to an empty listing without
//! touching the cache; absence and transport failures propagate.

use std::sync::Arc;

use crate::cache::{listing_cache_key, ListingCache};
use crate::client::DavTransport;
use crate::propfind::{parse_multistatus, PROPFIND_BODY};
use crate::types::{DavEntry, DavMethod, DavRequest, DriverError};
use crate::urls::{ensure_folder_identifier, ensure_identifier, name_of, parent_of, UrlMapper};

pub struct CachingDavFrontend {
    transport: Arc<dyn DavTransport>,
    mapper: UrlMapper,
    storage_id: String,
    cache: Arc<dyn ListingCache>,
    index_zero_byte_files: bool,
}

impl CachingDavFrontend {
    pub fn new(
        transport: Arc<dyn DavTransport>,
        mapper: UrlMapper,
        storage_id: impl Into<String>,
        cache: Arc<dyn ListingCache>,
        index_zero_byte_files: bool,
    ) -> Self {
        Self {
            transport,
            mapper,
            storage_id: storage_id.into(),
            cache,
            index_zero_byte_files,
        }
    }

    /// The immediate children of a folder, cache-first. The identifier
    /// must carry its trailing slash; a slash-less one is rejected rather
    /// than normalized, so the cache key and the request URL can never
    /// disagree about which path was listed.
    pub async fn propfind(&self, folder: &str) -> Result<Vec<DavEntry>, DriverError> {
        ensure_folder_identifier(folder)?;
        let key = listing_cache_key(&self.storage_id, folder);
        if let Some(listing) = self.cache.get(&key) {
            tracing::debug!("listing of {} served from cache", folder);
            return Ok(listing);
        }

        let url = self.mapper.resource_url(folder)?;
        let folder_href = url.public().to_string();
        let request = DavRequest::new(DavMethod::Propfind, url)
            .with_header("Depth", "1")
            .with_header("Content-Type", "application/xml")
            .with_body(PROPFIND_BODY);

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(crate::types::TransportError::NotFound(_)) => {
                return Err(DriverError::NotFound(folder.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !response.is_success() {
            tracing::warn!(
                "listing of {} degraded to empty result (status {})",
                folder,
                response.status
            );
            return Ok(Vec::new());
        }

        let xml = String::from_utf8_lossy(&response.body);
        let entries = parse_multistatus(&xml, &folder_href);
        self.cache.set(&key, entries.clone());
        Ok(entries)
    }

    /// Names of the files directly inside a folder. Zero-byte files are
    /// skipped when indexing them is disabled.
    pub async fn list_files(&self, folder: &str) -> Result<Vec<String>, DriverError> {
        Ok(self
            .propfind(folder)
            .await?
            .into_iter()
            .filter(|e| !e.is_dir)
            .filter(|e| self.index_zero_byte_files || e.size > 0)
            .map(|e| e.name)
            .collect())
    }

    /// Names of the folders directly inside a folder.
    pub async fn list_folders(&self, folder: &str) -> Result<Vec<String>, DriverError> {
        Ok(self
            .propfind(folder)
            .await?
            .into_iter()
            .filter(|e| e.is_dir)
            .map(|e| e.name)
            .collect())
    }

    /// Metadata for a single file, resolved through its parent's listing.
    pub async fn file_info(&self, identifier: &str) -> Result<DavEntry, DriverError> {
        ensure_identifier(identifier)?;
        let parent = parent_of(identifier);
        let name = name_of(identifier);

        self.propfind(&parent)
            .await?
            .into_iter()
            .filter(|e| !e.is_dir)
            .filter(|e| self.index_zero_byte_files || e.size > 0)
            .find(|e| e.name == name)
            .ok_or_else(|| DriverError::NotFound(identifier.to_string()))
    }

    /// Whether a folder has no children at all.
    pub async fn is_folder_empty(&self, folder: &str) -> Result<bool, DriverError> {
        Ok(self.propfind(folder).await?.is_empty())
    }

    /// Drops the cached listing for exactly this folder path. Descendant
    /// folders keep their own entries; their path-derived keys become
    /// unreachable once the paths change.
    pub fn invalidate(&self, folder: &str) {
        self.cache
            .remove(&listing_cache_key(&self.storage_id, folder));
    }
}
