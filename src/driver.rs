//! Filesystem driver.
//!
//! The public operation surface of the virtual filesystem: existence
//! probes, create/read/write/move/copy/delete for files and folders, and
//! the listing operations delegated to the caching directory frontend. The
//! driver owns the resolved storage configuration and is the single place
//! that invalidates cached listings when an operation mutates a folder's
//! direct contents.
//!
//! Conflict handling happens above this layer: every rename, move and copy
//! forces overwrite at the protocol level (`Overwrite: T`), the driver
//! never re-checks whether the destination exists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::cache::{ListingCache, MemoryListingCache};
use crate::client::{DavClient, DavTransport};
use crate::config::StorageConfig;
use crate::frontend::CachingDavFrontend;
use crate::types::{
    DavEntry, DavMethod, DavRequest, DavResponse, DriverError, FolderInfo, TransportError,
    WriteOutcome,
};
use crate::urls::{
    encode_path, ensure_folder_identifier, ensure_identifier, is_folder_identifier, name_of,
    parent_of, PublicUrl, UrlMapper,
};

pub struct WebDavDriver {
    config: StorageConfig,
    mapper: UrlMapper,
    transport: Arc<dyn DavTransport>,
    frontend: CachingDavFrontend,
}

impl WebDavDriver {
    /// Build a driver with the real HTTP transport and the bundled
    /// in-memory listing cache.
    pub fn new(config: StorageConfig) -> Result<Self, DriverError> {
        let transport: Arc<dyn DavTransport> =
            Arc::new(DavClient::new(config.verify_certificates())?);
        Ok(Self::with_components(
            config,
            transport,
            Arc::new(MemoryListingCache::new()),
        ))
    }

    /// Build a driver from fully formed collaborators. This is the
    /// injection seam used by tests and by hosts that bring their own
    /// transport or cache store.
    pub fn with_components(
        config: StorageConfig,
        transport: Arc<dyn DavTransport>,
        cache: Arc<dyn ListingCache>,
    ) -> Self {
        let mapper = config.url_mapper();
        let frontend = CachingDavFrontend::new(
            transport.clone(),
            mapper.clone(),
            config.storage_id().to_string(),
            cache,
            config.index_zero_byte_files(),
        );
        Self {
            config,
            mapper,
            transport,
            frontend,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn request(&self, method: DavMethod, identifier: &str) -> Result<DavRequest, DriverError> {
        Ok(DavRequest::new(method, self.mapper.resource_url(identifier)?))
    }

    fn invalidate(&self, folder: &str) {
        self.frontend.invalidate(folder);
    }

    /// MOVE/COPY share the destination handling: the `Destination` header
    /// always carries the public, percent-encoded URL, never the
    /// credentialed form.
    async fn execute_transfer(
        &self,
        method: DavMethod,
        operation: &'static str,
        source: &str,
        target: &str,
    ) -> Result<(), DriverError> {
        let destination = encode_path(self.mapper.public_url(target)?.as_str());
        let request = self
            .request(method, source)?
            .with_header("Destination", destination)
            .with_header("Overwrite", "T");

        let path = format!("{} -> {}", source, target);
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(TransportError::NotFound(_)) => {
                return Err(DriverError::NotFound(source.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        match WriteOutcome::from_status(response.status) {
            Some(outcome) => {
                tracing::debug!("{} {}: {:?}", operation, path, outcome);
                Ok(())
            }
            None => Err(DriverError::operation_failed(
                operation,
                path,
                format!("status {}", response.status),
            )),
        }
    }

    // ---- existence -------------------------------------------------------

    /// Whether any resource answers at the identifier. A response other
    /// than 404 counts as present: a 403-protected resource exists, it is
    /// just not readable. Transport failures propagate.
    pub async fn resource_exists(&self, identifier: &str) -> Result<bool, DriverError> {
        ensure_identifier(identifier)?;
        match self.transport.execute(self.request(DavMethod::Head, identifier)?).await {
            Ok(_) => Ok(true),
            Err(TransportError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn file_exists(&self, identifier: &str) -> Result<bool, DriverError> {
        if is_folder_identifier(identifier) {
            return Ok(false);
        }
        self.resource_exists(identifier).await
    }

    pub async fn file_exists_in_folder(
        &self,
        file_name: &str,
        folder_identifier: &str,
    ) -> Result<bool, DriverError> {
        self.file_exists(&format!("{}{}", folder_identifier, file_name))
            .await
    }

    pub async fn folder_exists(&self, identifier: &str) -> Result<bool, DriverError> {
        let trimmed = identifier.trim_matches('/');
        let folder = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };
        self.resource_exists(&folder).await
    }

    pub async fn folder_exists_in_folder(
        &self,
        folder_name: &str,
        folder_identifier: &str,
    ) -> Result<bool, DriverError> {
        self.resource_exists(&format!("{}{}/", folder_identifier, folder_name))
            .await
    }

    // ---- files -----------------------------------------------------------

    /// Create an empty file and return its identifier.
    pub async fn create_file(
        &self,
        file_name: &str,
        parent_folder_identifier: &str,
    ) -> Result<String, DriverError> {
        ensure_folder_identifier(parent_folder_identifier)?;
        ensure_name(file_name)?;
        let identifier = format!("{}{}", parent_folder_identifier, file_name);

        let response = self
            .execute_write("create file", &identifier, Vec::new())
            .await?;
        if WriteOutcome::from_status(response.status).is_none() {
            return Err(DriverError::operation_failed(
                "create file",
                identifier,
                format!("status {}", response.status),
            ));
        }

        self.invalidate(parent_folder_identifier);
        Ok(identifier)
    }

    /// The complete contents of a file. Loads the file into memory, which
    /// can be expensive for large files on a remote store.
    pub async fn get_file_contents(&self, identifier: &str) -> Result<Vec<u8>, DriverError> {
        ensure_identifier(identifier)?;
        let response = match self.transport.execute(self.request(DavMethod::Get, identifier)?).await
        {
            Ok(response) => response,
            Err(TransportError::NotFound(_)) => {
                return Err(DriverError::NotFound(identifier.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !response.is_success() {
            return Err(DriverError::operation_failed(
                "read",
                identifier,
                format!("status {}", response.status),
            ));
        }
        Ok(response.body)
    }

    /// Replace the contents of a file. Returns whether the server created
    /// the resource or overwrote an existing one.
    pub async fn set_file_contents(
        &self,
        identifier: &str,
        contents: impl Into<Vec<u8>>,
    ) -> Result<WriteOutcome, DriverError> {
        ensure_identifier(identifier)?;
        let response = self.execute_write("write", identifier, contents.into()).await?;
        let outcome = WriteOutcome::from_status(response.status).ok_or_else(|| {
            DriverError::operation_failed("write", identifier, format!("status {}", response.status))
        })?;

        self.invalidate(&parent_of(identifier));
        Ok(outcome)
    }

    /// Upload a local file into a folder and return the new identifier.
    pub async fn add_file(
        &self,
        local_path: &Path,
        target_folder_identifier: &str,
        new_file_name: &str,
    ) -> Result<String, DriverError> {
        ensure_folder_identifier(target_folder_identifier)?;
        ensure_name(new_file_name)?;
        let contents = read_local_source(local_path).await?;
        let identifier = format!("{}{}", target_folder_identifier, new_file_name);

        let response = self.execute_write("add file", &identifier, contents).await?;
        if WriteOutcome::from_status(response.status).is_none() {
            return Err(DriverError::operation_failed(
                "add file",
                identifier,
                format!("status {}", response.status),
            ));
        }

        self.invalidate(target_folder_identifier);
        Ok(identifier)
    }

    /// Replace a file's contents with those of a local file.
    pub async fn replace_file(
        &self,
        identifier: &str,
        local_path: &Path,
    ) -> Result<WriteOutcome, DriverError> {
        ensure_identifier(identifier)?;
        let contents = read_local_source(local_path).await?;
        self.set_file_contents(identifier, contents).await
    }

    /// Delete a file. Succeeds only on the "no content after deletion"
    /// status (204); other 2xx codes are not success for delete.
    pub async fn delete_file(&self, identifier: &str) -> Result<(), DriverError> {
        ensure_identifier(identifier)?;
        let response = match self
            .transport
            .execute(self.request(DavMethod::Delete, identifier)?)
            .await
        {
            Ok(response) => response,
            Err(TransportError::NotFound(_)) => {
                return Err(DriverError::NotFound(identifier.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if response.status != 204 {
            return Err(DriverError::operation_failed(
                "delete",
                identifier,
                format!("status {}", response.status),
            ));
        }

        self.invalidate(&parent_of(identifier));
        Ok(())
    }

    /// Rename a file in place and return its new identifier.
    pub async fn rename_file(&self, identifier: &str, new_name: &str) -> Result<String, DriverError> {
        ensure_identifier(identifier)?;
        ensure_name(new_name)?;
        let parent = parent_of(identifier);
        let target = format!("{}{}", parent, new_name);

        self.execute_transfer(DavMethod::Move, "rename file", identifier, &target)
            .await?;

        self.invalidate(&parent);
        Ok(target)
    }

    /// Move a file to another folder within this storage. Both the source
    /// and the destination folder's cached listings are invalidated.
    pub async fn move_file_within_storage(
        &self,
        identifier: &str,
        target_folder_identifier: &str,
        new_file_name: &str,
    ) -> Result<String, DriverError> {
        ensure_identifier(identifier)?;
        ensure_folder_identifier(target_folder_identifier)?;
        ensure_name(new_file_name)?;
        let target = format!("{}{}", target_folder_identifier, new_file_name);

        self.execute_transfer(DavMethod::Move, "move file", identifier, &target)
            .await?;

        self.invalidate(&parent_of(identifier));
        self.invalidate(target_folder_identifier);
        Ok(target)
    }

    /// Copy a file to another folder within this storage. The source stays
    /// in place, so no cached listing needs invalidation.
    pub async fn copy_file_within_storage(
        &self,
        identifier: &str,
        target_folder_identifier: &str,
        file_name: &str,
    ) -> Result<String, DriverError> {
        ensure_identifier(identifier)?;
        ensure_folder_identifier(target_folder_identifier)?;
        ensure_name(file_name)?;
        let target = format!("{}{}", target_folder_identifier, file_name);

        self.execute_transfer(DavMethod::Copy, "copy file", identifier, &target)
            .await?;
        Ok(target)
    }

    // ---- folders ---------------------------------------------------------

    /// Create a folder inside a parent folder and return its identifier.
    pub async fn create_folder(
        &self,
        new_folder_name: &str,
        parent_folder_identifier: &str,
    ) -> Result<String, DriverError> {
        ensure_folder_identifier(parent_folder_identifier)?;
        ensure_name(new_folder_name)?;
        // Some servers want the trailing slash on MKCOL, none mind it.
        let identifier = format!("{}{}/", parent_folder_identifier, new_folder_name);

        let response = match self
            .transport
            .execute(self.request(DavMethod::Mkcol, &identifier)?)
            .await
        {
            Ok(response) => response,
            Err(TransportError::NotFound(_)) => {
                return Err(DriverError::NotFound(parent_folder_identifier.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !response.is_success() {
            return Err(DriverError::operation_failed(
                "create folder",
                identifier,
                format!("status {}", response.status),
            ));
        }

        self.invalidate(parent_folder_identifier);
        Ok(identifier)
    }

    /// Delete a folder. No Depth header is sent; RFC 4918 specifies that
    /// servers delete collections as if `Depth: infinity` were given, so
    /// recursion into non-empty folders is the server's default behavior.
    pub async fn delete_folder(&self, identifier: &str) -> Result<(), DriverError> {
        ensure_folder_identifier(identifier)?;
        let response = match self
            .transport
            .execute(self.request(DavMethod::Delete, identifier)?)
            .await
        {
            Ok(response) => response,
            Err(TransportError::NotFound(_)) => {
                return Err(DriverError::NotFound(identifier.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !response.is_success() {
            return Err(DriverError::operation_failed(
                "delete folder",
                identifier,
                format!("status {}", response.status),
            ));
        }

        self.invalidate(&parent_of(identifier));
        self.invalidate(identifier);
        Ok(())
    }

    /// Rename a folder in place and return its new identifier.
    pub async fn rename_folder(
        &self,
        identifier: &str,
        new_name: &str,
    ) -> Result<String, DriverError> {
        ensure_folder_identifier(identifier)?;
        ensure_name(new_name)?;
        let parent = parent_of(identifier);
        let target = format!("{}{}/", parent, new_name);

        self.execute_transfer(DavMethod::Move, "rename folder", identifier, &target)
            .await?;

        self.invalidate(&parent);
        self.invalidate(identifier);
        Ok(target)
    }

    /// Move a folder below another parent within this storage.
    pub async fn move_folder_within_storage(
        &self,
        source_folder_identifier: &str,
        target_folder_identifier: &str,
        new_folder_name: &str,
    ) -> Result<String, DriverError> {
        ensure_folder_identifier(source_folder_identifier)?;
        ensure_folder_identifier(target_folder_identifier)?;
        ensure_name(new_folder_name)?;
        let target = format!("{}{}/", target_folder_identifier, new_folder_name);

        self.execute_transfer(
            DavMethod::Move,
            "move folder",
            source_folder_identifier,
            &target,
        )
        .await?;

        self.invalidate(&parent_of(source_folder_identifier));
        self.invalidate(target_folder_identifier);
        self.invalidate(source_folder_identifier);
        Ok(target)
    }

    /// Copy a folder below another parent within this storage.
    pub async fn copy_folder_within_storage(
        &self,
        source_folder_identifier: &str,
        target_folder_identifier: &str,
        new_folder_name: &str,
    ) -> Result<String, DriverError> {
        ensure_folder_identifier(source_folder_identifier)?;
        ensure_folder_identifier(target_folder_identifier)?;
        ensure_name(new_folder_name)?;
        let target = format!("{}{}/", target_folder_identifier, new_folder_name);

        self.execute_transfer(
            DavMethod::Copy,
            "copy folder",
            source_folder_identifier,
            &target,
        )
        .await?;
        Ok(target)
    }

    pub async fn is_folder_empty(&self, identifier: &str) -> Result<bool, DriverError> {
        ensure_folder_identifier(identifier)?;
        self.frontend.is_folder_empty(identifier).await
    }

    // ---- listings --------------------------------------------------------

    /// Identifiers of the files directly inside a folder.
    pub async fn get_files_in_folder(
        &self,
        folder_identifier: &str,
    ) -> Result<Vec<String>, DriverError> {
        Ok(self
            .frontend
            .list_files(folder_identifier)
            .await?
            .into_iter()
            .map(|name| format!("{}{}", folder_identifier, name))
            .collect())
    }

    pub async fn count_files_in_folder(&self, folder_identifier: &str) -> Result<usize, DriverError> {
        Ok(self.frontend.list_files(folder_identifier).await?.len())
    }

    /// Identifiers of the folders directly inside a folder.
    pub async fn get_folders_in_folder(
        &self,
        folder_identifier: &str,
    ) -> Result<Vec<String>, DriverError> {
        Ok(self
            .frontend
            .list_folders(folder_identifier)
            .await?
            .into_iter()
            .map(|name| format!("{}{}/", folder_identifier, name))
            .collect())
    }

    pub async fn count_folders_in_folder(
        &self,
        folder_identifier: &str,
    ) -> Result<usize, DriverError> {
        Ok(self.frontend.list_folders(folder_identifier).await?.len())
    }

    /// Identifier of a named file inside a folder, or `NotFound`.
    pub async fn get_file_in_folder(
        &self,
        file_name: &str,
        folder_identifier: &str,
    ) -> Result<String, DriverError> {
        let names = self.frontend.list_files(folder_identifier).await?;
        if names.iter().any(|n| n == file_name) {
            Ok(format!("{}{}", folder_identifier, file_name))
        } else {
            Err(DriverError::NotFound(format!(
                "{}{}",
                folder_identifier, file_name
            )))
        }
    }

    /// Identifier of a named folder inside a folder, or `NotFound`.
    pub async fn get_folder_in_folder(
        &self,
        folder_name: &str,
        folder_identifier: &str,
    ) -> Result<String, DriverError> {
        let names = self.frontend.list_folders(folder_identifier).await?;
        if names.iter().any(|n| n == folder_name) {
            Ok(format!("{}{}/", folder_identifier, folder_name))
        } else {
            Err(DriverError::NotFound(format!(
                "{}{}/",
                folder_identifier, folder_name
            )))
        }
    }

    /// Metadata for a single file, resolved through its parent's listing.
    pub async fn get_file_info(&self, identifier: &str) -> Result<DavEntry, DriverError> {
        self.frontend.file_info(identifier).await
    }

    pub async fn get_folder_info(&self, identifier: &str) -> Result<FolderInfo, DriverError> {
        if !self.folder_exists(identifier).await? {
            return Err(DriverError::NotFound(identifier.to_string()));
        }
        Ok(FolderInfo {
            identifier: identifier.to_string(),
            name: name_of(identifier).to_string(),
            storage_id: self.config.storage_id().to_string(),
        })
    }

    // ---- local processing ------------------------------------------------

    /// Download a file to a temporary local path. The caller owns the
    /// temporary file and must remove it after use.
    pub async fn copy_file_to_temporary_path(
        &self,
        identifier: &str,
    ) -> Result<PathBuf, DriverError> {
        let contents = self.get_file_contents(identifier).await?;
        let temporary_path =
            std::env::temp_dir().join(format!("webdav-vfs-{}", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&temporary_path, &contents).await {
            let _ = tokio::fs::remove_file(&temporary_path).await;
            return Err(e.into());
        }
        Ok(temporary_path)
    }

    /// A local copy of a file for processing. The `writable` hint is
    /// accepted for interface compatibility; a fresh copy is made either
    /// way and the caller is responsible for removing it.
    pub async fn get_file_for_local_processing(
        &self,
        identifier: &str,
        _writable: bool,
    ) -> Result<PathBuf, DriverError> {
        self.copy_file_to_temporary_path(identifier).await
    }

    /// Content hash of a file. Requires materializing the file locally;
    /// the temporary copy is removed on every exit path.
    pub async fn hash(&self, identifier: &str, algorithm: &str) -> Result<String, DriverError> {
        if algorithm != "sha1" {
            return Err(DriverError::InvalidArgument(format!(
                "unsupported hash algorithm '{}'",
                algorithm
            )));
        }

        let temporary_path = self.copy_file_to_temporary_path(identifier).await?;
        let contents = tokio::fs::read(&temporary_path).await;
        let _ = tokio::fs::remove_file(&temporary_path).await;

        let mut hasher = Sha1::new();
        hasher.update(&contents?);
        Ok(hex::encode(hasher.finalize()))
    }

    // ---- miscellany ------------------------------------------------------

    /// The public URL of a resource. Never contains credentials.
    pub fn public_url(&self, identifier: &str) -> Result<PublicUrl, DriverError> {
        self.mapper.public_url(identifier)
    }

    pub fn root_level_folder(&self) -> &'static str {
        "/"
    }

    pub fn default_folder(&self) -> &'static str {
        "/"
    }

    pub fn parent_folder_identifier(&self, identifier: &str) -> String {
        parent_of(identifier)
    }

    /// Whether an identifier lies within a container folder.
    pub fn is_within(&self, container_identifier: &str, identifier: &str) -> bool {
        let content = format!("/{}", identifier.trim_start_matches('/'));
        content.starts_with(container_identifier)
    }

    async fn execute_write(
        &self,
        operation: &'static str,
        identifier: &str,
        contents: Vec<u8>,
    ) -> Result<DavResponse, DriverError> {
        match self
            .transport
            .execute(self.request(DavMethod::Put, identifier)?.with_body(contents))
            .await
        {
            Ok(response) => Ok(response),
            Err(TransportError::NotFound(_)) => Err(DriverError::operation_failed(
                operation,
                identifier,
                "parent collection does not exist",
            )),
            Err(e) => Err(e.into()),
        }
    }
}

fn ensure_name(name: &str) -> Result<(), DriverError> {
    if name.is_empty() || name.contains('/') {
        return Err(DriverError::InvalidArgument(format!(
            "invalid resource name '{}'",
            name
        )));
    }
    Ok(())
}

async fn read_local_source(local_path: &Path) -> Result<Vec<u8>, DriverError> {
    tokio::fs::read(local_path).await.map_err(|e| {
        DriverError::InvalidArgument(format!(
            "cannot read local source file {}: {}",
            local_path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawStorageConfig;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::Mutex;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<DavResponse, TransportError>>>,
        requests: Mutex<Vec<DavRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<DavResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<DavRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DavTransport for ScriptedTransport {
        async fn execute(&self, request: DavRequest) -> Result<DavResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request")
        }
    }

    fn ok(status: u16) -> Result<DavResponse, TransportError> {
        Ok(DavResponse::degraded(status))
    }

    fn body(status: u16, bytes: &[u8]) -> Result<DavResponse, TransportError> {
        Ok(DavResponse::new(status, Default::default(), bytes.to_vec()))
    }

    fn not_found() -> Result<DavResponse, TransportError> {
        Err(TransportError::NotFound("gone".to_string()))
    }

    fn listing(folder_path: &str, children: &[(&str, bool)]) -> Result<DavResponse, TransportError> {
        let mut xml = String::from(r#"<d:multistatus xmlns:d="DAV:">"#);
        xml.push_str(&format!(
            "<d:response><d:href>{}</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat></d:response>",
            folder_path
        ));
        for (name, is_dir) in children {
            let (suffix, prop) = if *is_dir {
                (format!("{}/", name), "<d:resourcetype><d:collection/></d:resourcetype>")
            } else {
                (name.to_string(), "<d:resourcetype/><d:getcontentlength>5</d:getcontentlength>")
            };
            xml.push_str(&format!(
                "<d:response><d:href>{}{}</d:href><d:propstat><d:prop>{}</d:prop></d:propstat></d:response>",
                folder_path, suffix, prop
            ));
        }
        xml.push_str("</d:multistatus>");
        Ok(DavResponse::new(207, Default::default(), xml.into_bytes()))
    }

    fn driver(transport: Arc<ScriptedTransport>) -> WebDavDriver {
        let raw = RawStorageConfig {
            base_url: "https://dav.example.com/share".to_string(),
            username: "alice".to_string(),
            password: "s3cret".to_string(),
            use_authentication: true,
            disable_certificate_verification: false,
            index_zero_byte_files: true,
        };
        let config = StorageConfig::resolve("1", &raw).unwrap();
        WebDavDriver::with_components(config, transport, Arc::new(MemoryListingCache::new()))
    }

    fn header<'a>(request: &'a DavRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_create_file_invalidates_parent_listing() {
        let transport = ScriptedTransport::new(vec![
            listing("/share/docs/", &[]),
            ok(201),
            listing("/share/docs/", &[("new.txt", false)]),
        ]);
        let driver = driver(transport.clone());

        assert!(driver.get_files_in_folder("/docs/").await.unwrap().is_empty());

        let identifier = driver.create_file("new.txt", "/docs/").await.unwrap();
        assert_eq!(identifier, "/docs/new.txt");

        // The stale pre-create listing must not be served again
        let files = driver.get_files_in_folder("/docs/").await.unwrap();
        assert_eq!(files, vec!["/docs/new.txt"]);
        assert_eq!(transport.call_count(), 3);

        let requests = transport.requests();
        assert_eq!(requests[1].method, DavMethod::Put);
        assert_eq!(requests[1].body.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_existence_probe_is_not_an_error() {
        let transport = ScriptedTransport::new(vec![not_found(), not_found(), ok(200)]);
        let driver = driver(transport.clone());

        // Absent twice in a row, one request per check
        assert!(!driver.resource_exists("/missing.txt").await.unwrap());
        assert!(!driver.resource_exists("/missing.txt").await.unwrap());
        assert_eq!(transport.call_count(), 2);

        assert!(driver.resource_exists("/present.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_protected_resource_counts_as_existing() {
        let transport = ScriptedTransport::new(vec![ok(403)]);
        let driver = driver(transport);
        assert!(driver.resource_exists("/locked.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_exists_rejects_folder_identifiers_without_request() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport.clone());
        assert!(!driver.file_exists("/docs/").await.unwrap());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_folder_exists_normalizes_identifier() {
        let transport = ScriptedTransport::new(vec![ok(200)]);
        let driver = driver(transport.clone());
        assert!(driver.folder_exists("/docs").await.unwrap());
        let requests = transport.requests();
        assert!(requests[0].url.public().ends_with("/share/docs/"));
    }

    #[tokio::test]
    async fn test_contents_roundtrip() {
        let payload = b"known bytes".to_vec();
        let transport = ScriptedTransport::new(vec![ok(204), body(200, &payload)]);
        let driver = driver(transport);

        let outcome = driver
            .set_file_contents("/docs/a.txt", payload.clone())
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Overwritten);

        let read_back = driver.get_file_contents("/docs/a.txt").await.unwrap();
        assert_eq!(read_back, payload);
    }

    #[tokio::test]
    async fn test_read_of_missing_file_is_not_found() {
        let transport = ScriptedTransport::new(vec![not_found()]);
        let driver = driver(transport);
        assert!(matches!(
            driver.get_file_contents("/docs/gone.txt").await,
            Err(DriverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_file_succeeds_only_on_no_content() {
        let transport = ScriptedTransport::new(vec![ok(204), ok(200), not_found()]);
        let driver = driver(transport);

        assert!(driver.delete_file("/docs/a.txt").await.is_ok());
        assert!(matches!(
            driver.delete_file("/docs/b.txt").await,
            Err(DriverError::OperationFailed { .. })
        ));
        assert!(matches!(
            driver.delete_file("/docs/c.txt").await,
            Err(DriverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_file_invalidates_source_and_destination() {
        let transport = ScriptedTransport::new(vec![
            listing("/share/a/", &[("f.txt", false)]),
            listing("/share/b/", &[]),
            ok(201),
            listing("/share/a/", &[]),
            listing("/share/b/", &[("f.txt", false)]),
        ]);
        let driver = driver(transport.clone());

        // Prime both folder caches
        assert_eq!(driver.count_files_in_folder("/a/").await.unwrap(), 1);
        assert_eq!(driver.count_files_in_folder("/b/").await.unwrap(), 0);

        let target = driver
            .move_file_within_storage("/a/f.txt", "/b/", "f.txt")
            .await
            .unwrap();
        assert_eq!(target, "/b/f.txt");

        // Both listings refetch instead of serving the stale cache
        assert!(driver.get_files_in_folder("/a/").await.unwrap().is_empty());
        assert_eq!(
            driver.get_files_in_folder("/b/").await.unwrap(),
            vec!["/b/f.txt"]
        );
        assert_eq!(transport.call_count(), 5);

        let requests = transport.requests();
        let mv = &requests[2];
        assert_eq!(mv.method, DavMethod::Move);
        assert_eq!(header(mv, "Overwrite"), Some("T"));
        assert_eq!(
            header(mv, "Destination"),
            Some("https://dav.example.com/share/b/f.txt")
        );
    }

    #[tokio::test]
    async fn test_copy_file_keeps_source_listing_cached() {
        let transport = ScriptedTransport::new(vec![
            listing("/share/a/", &[("f.txt", false)]),
            ok(201),
        ]);
        let driver = driver(transport.clone());

        driver.get_files_in_folder("/a/").await.unwrap();
        let target = driver
            .copy_file_within_storage("/a/f.txt", "/b/", "copy.txt")
            .await
            .unwrap();
        assert_eq!(target, "/b/copy.txt");

        // Copy removes nothing, the source listing stays served from cache
        assert_eq!(driver.count_files_in_folder("/a/").await.unwrap(), 1);
        assert_eq!(transport.call_count(), 2);

        let requests = transport.requests();
        let copy = &requests[1];
        assert_eq!(copy.method, DavMethod::Copy);
        assert_eq!(header(copy, "Overwrite"), Some("T"));
    }

    #[tokio::test]
    async fn test_destination_header_never_contains_credentials() {
        let transport = ScriptedTransport::new(vec![ok(204)]);
        let driver = driver(transport.clone());

        driver
            .move_file_within_storage("/a/my file.txt", "/b/", "my file.txt")
            .await
            .unwrap();

        let requests = transport.requests();
        let destination = header(&requests[0], "Destination").unwrap();
        assert!(!destination.contains("s3cret"));
        assert!(!destination.contains("alice:"));
        assert_eq!(destination, "https://dav.example.com/share/b/my%20file.txt");
    }

    #[tokio::test]
    async fn test_create_list_delete_folder_scenario() {
        let transport = ScriptedTransport::new(vec![
            ok(201), // MKCOL
            listing("/share/docs/", &[("reports", true)]),
            ok(204), // DELETE
            listing("/share/docs/", &[]),
        ]);
        let driver = driver(transport.clone());

        let identifier = driver.create_folder("reports", "/docs/").await.unwrap();
        assert_eq!(identifier, "/docs/reports/");

        assert_eq!(
            driver.get_folders_in_folder("/docs/").await.unwrap(),
            vec!["/docs/reports/"]
        );

        driver.delete_folder("/docs/reports/").await.unwrap();

        // The cache entry for /docs/ was refreshed, not served stale
        assert!(driver.get_folders_in_folder("/docs/").await.unwrap().is_empty());
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn test_rename_folder_produces_new_identifier() {
        let transport = ScriptedTransport::new(vec![
            ok(201),
            listing("/share/docs/", &[("archive", true)]),
        ]);
        let driver = driver(transport.clone());

        let renamed = driver.rename_folder("/docs/reports/", "archive").await.unwrap();
        assert_eq!(renamed, "/docs/archive/");

        let folders = driver.get_folders_in_folder("/docs/").await.unwrap();
        assert_eq!(folders, vec!["/docs/archive/"]);

        let requests = transport.requests();
        let mv = &requests[0];
        assert_eq!(mv.method, DavMethod::Move);
        assert_eq!(
            header(mv, "Destination"),
            Some("https://dav.example.com/share/docs/archive/")
        );
    }

    #[tokio::test]
    async fn test_hash_sha1() {
        let transport = ScriptedTransport::new(vec![body(200, b"hello world")]);
        let driver = driver(transport);

        let digest = driver.hash("/docs/a.txt", "sha1").await.unwrap();
        assert_eq!(digest, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[tokio::test]
    async fn test_unsupported_hash_algorithm_issues_no_request() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport.clone());

        assert!(matches!(
            driver.hash("/docs/a.txt", "md5").await,
            Err(DriverError::InvalidArgument(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_temporary_copy_is_caller_owned() {
        let transport = ScriptedTransport::new(vec![body(200, b"payload")]);
        let driver = driver(transport);

        let path = driver.copy_file_to_temporary_path("/docs/a.txt").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_add_file_uploads_local_contents() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"local bytes").unwrap();

        let transport = ScriptedTransport::new(vec![ok(201)]);
        let driver = driver(transport.clone());

        let identifier = driver
            .add_file(source.path(), "/docs/", "upload.bin")
            .await
            .unwrap();
        assert_eq!(identifier, "/docs/upload.bin");

        let requests = transport.requests();
        assert_eq!(requests[0].method, DavMethod::Put);
        assert_eq!(requests[0].body.as_deref(), Some(&b"local bytes"[..]));
    }

    #[tokio::test]
    async fn test_unreadable_local_source_issues_no_request() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport.clone());

        assert!(matches!(
            driver
                .add_file(Path::new("/definitely/not/here"), "/docs/", "x.bin")
                .await,
            Err(DriverError::InvalidArgument(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_file_in_folder_lookup() {
        let transport = ScriptedTransport::new(vec![listing(
            "/share/docs/",
            &[("a.txt", false), ("sub", true)],
        )]);
        let driver = driver(transport);

        assert_eq!(
            driver.get_file_in_folder("a.txt", "/docs/").await.unwrap(),
            "/docs/a.txt"
        );
        assert!(matches!(
            driver.get_file_in_folder("b.txt", "/docs/").await,
            Err(DriverError::NotFound(_))
        ));
        assert_eq!(
            driver.get_folder_in_folder("sub", "/docs/").await.unwrap(),
            "/docs/sub/"
        );
    }

    #[tokio::test]
    async fn test_folder_info() {
        let transport = ScriptedTransport::new(vec![ok(200), not_found()]);
        let driver = driver(transport);

        let info = driver.get_folder_info("/docs/reports/").await.unwrap();
        assert_eq!(info.identifier, "/docs/reports/");
        assert_eq!(info.name, "reports");
        assert_eq!(info.storage_id, "1");

        assert!(matches!(
            driver.get_folder_info("/docs/gone/").await,
            Err(DriverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_public_url_is_credential_free() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport);

        let url = driver.public_url("/docs/a.txt").unwrap();
        assert_eq!(url.as_str(), "https://dav.example.com/share/docs/a.txt");
    }

    #[tokio::test]
    async fn test_empty_identifier_rejected_before_any_request() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport.clone());

        assert!(matches!(
            driver.resource_exists("").await,
            Err(DriverError::InvalidArgument(_))
        ));
        assert!(matches!(
            driver.create_file("a.txt", "/docs").await,
            Err(DriverError::InvalidArgument(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_listing_rejects_slashless_folder_identifier() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport.clone());

        assert!(matches!(
            driver.get_files_in_folder("/docs").await,
            Err(DriverError::InvalidArgument(_))
        ));
        assert!(matches!(
            driver.get_folder_in_folder("sub", "/docs").await,
            Err(DriverError::InvalidArgument(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_is_within() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport);

        assert!(driver.is_within("/docs/", "/docs/a.txt"));
        assert!(driver.is_within("/docs/", "docs/sub/b.txt"));
        assert!(!driver.is_within("/docs/", "/other/a.txt"));
    }

    #[test]
    fn test_parent_and_root_accessors() {
        let transport = ScriptedTransport::new(vec![]);
        let driver = driver(transport);

        assert_eq!(driver.parent_folder_identifier("/docs/a.txt"), "/docs/");
        assert_eq!(driver.root_level_folder(), "/");
        assert_eq!(driver.default_folder(), "/");
    }
}
