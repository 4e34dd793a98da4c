//! A hierarchical virtual filesystem backed by a WebDAV share.
//!
//! Resources are addressed by slash-separated identifiers relative to the
//! configured share root (`/docs/report.pdf`, `/docs/reports/`); a folder
//! identifier always carries a trailing slash. The crate maps identifiers
//! onto two URL forms: a public one, safe to log and hand out, and a
//! credentialed one that only the transport ever sees.
//!
//! Layering, top to bottom:
//!
//! - [`WebDavDriver`] — the operation surface (exists, create, read,
//!   write, move, copy, delete, list) and the place where cached listings
//!   are invalidated after mutations.
//! - [`CachingDavFrontend`] — folder listings via PROPFIND with a
//!   cache-first read path keyed per storage and folder.
//! - [`DavClient`] — the HTTP transport, behind the [`DavTransport`]
//!   trait so tests and hosts can substitute their own.
//!
//! ```no_run
//! use webdav_vfs::{RawStorageConfig, StorageConfig, WebDavDriver};
//!
//! # async fn demo() -> Result<(), webdav_vfs::DriverError> {
//! let raw = RawStorageConfig::from_json(
//!     r#"{"baseUrl": "https://dav.example.com/share",
//!         "username": "alice", "password": "wonder",
//!         "useAuthentication": true}"#,
//! )?;
//! let driver = WebDavDriver::new(StorageConfig::resolve("1", &raw)?)?;
//!
//! let files = driver.get_files_in_folder("/docs/").await?;
//! let contents = driver.get_file_contents("/docs/report.pdf").await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod driver;
pub mod frontend;
pub mod propfind;
pub mod types;
pub mod urls;

pub use cache::{listing_cache_key, ListingCache, MemoryListingCache};
pub use client::{DavClient, DavTransport};
pub use config::{RawStorageConfig, StorageConfig};
pub use driver::WebDavDriver;
pub use frontend::CachingDavFrontend;
pub use types::{
    DavEntry, DavMethod, DavRequest, DavResponse, DriverError, FolderInfo, TransportError,
    WriteOutcome,
};
pub use urls::{PublicUrl, ResourceUrl, UrlMapper};
