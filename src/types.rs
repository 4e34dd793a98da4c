//! Shared types for the WebDAV virtual filesystem.
//!
//! This module contains the listing entry representation, the transport
//! request/response pair exchanged with a [`DavTransport`](crate::client::DavTransport)
//! implementation, and the two error tiers: [`TransportError`] for wire-level
//! failures and [`DriverError`] for the small closed set of caller-facing
//! outcomes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::urls::ResourceUrl;

/// A single child entry of a folder listing, as last observed from the
/// remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DavEntry {
    /// File or folder name (no path, no trailing slash)
    pub name: String,
    /// Whether this entry is a folder (WebDAV collection)
    pub is_dir: bool,
    /// Size in bytes (0 for folders)
    pub size: u64,
    /// Last modification time as reported by the server
    pub modified: Option<String>,
    /// MIME type, if the server reported one
    pub mime_type: Option<String>,
    /// Entity tag, if the server reported one
    pub etag: Option<String>,
}

impl DavEntry {
    /// Create a folder entry
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            size: 0,
            modified: None,
            mime_type: None,
            etag: None,
        }
    }

    /// Create a file entry
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size,
            modified: None,
            mime_type: None,
            etag: None,
        }
    }
}

/// Summary information about a folder, as handed to the host layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub identifier: String,
    pub name: String,
    pub storage_id: String,
}

/// The WebDAV verbs this driver issues against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavMethod {
    Head,
    Get,
    Put,
    Delete,
    Mkcol,
    Propfind,
    Move,
    Copy,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DavMethod::Head => "HEAD",
            DavMethod::Get => "GET",
            DavMethod::Put => "PUT",
            DavMethod::Delete => "DELETE",
            DavMethod::Mkcol => "MKCOL",
            DavMethod::Propfind => "PROPFIND",
            DavMethod::Move => "MOVE",
            DavMethod::Copy => "COPY",
        }
    }
}

impl fmt::Display for DavMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request against the remote store.
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: DavMethod,
    pub url: ResourceUrl,
    pub body: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
}

impl DavRequest {
    pub fn new(method: DavMethod, url: ResourceUrl) -> Self {
        Self {
            method,
            url,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Uniform outcome of a transport request.
///
/// Protocol-level rejections (non-2xx other than 404) are *not* an `Err`:
/// the transport logs them and hands back a neutral response that keeps the
/// real status code and an empty body, so listing callers can degrade
/// gracefully while mutating callers still see the failure in the status.
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl DavResponse {
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Neutral response for a logged protocol error: real status, no body.
    pub fn degraded(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The two distinct but both-successful outcomes of a create/overwrite
/// request. Servers answer 201 when the destination did not exist before
/// and 200/204 when an existing resource was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Overwritten,
}

impl WriteOutcome {
    /// Classify a status code, or `None` if the write did not succeed.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            201 => Some(WriteOutcome::Created),
            200 | 204 => Some(WriteOutcome::Overwritten),
            _ => None,
        }
    }
}

/// Wire-level failure raised by the transport client.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The addressed resource does not exist (HTTP 404). Propagated
    /// verbatim so callers can distinguish absence from failure.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The remote store could not be reached at all (connection or TLS
    /// failure). Always surfaced, never treated as absence.
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Caller-facing failure produced by the filesystem driver.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("resource does not exist: {0}")]
    NotFound(String),

    /// A mutating request did not succeed for a reason other than absence.
    /// Carries the attempted identifiers (`path` is `source -> target` for
    /// move/copy operations).
    #[error("{operation} failed for {path}: {reason}")]
    OperationFailed {
        operation: &'static str,
        path: String,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub(crate) fn operation_failed(
        operation: &'static str,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DriverError::OperationFailed {
            operation,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_outcome_classification() {
        assert_eq!(WriteOutcome::from_status(201), Some(WriteOutcome::Created));
        assert_eq!(WriteOutcome::from_status(204), Some(WriteOutcome::Overwritten));
        assert_eq!(WriteOutcome::from_status(200), Some(WriteOutcome::Overwritten));
        assert_eq!(WriteOutcome::from_status(403), None);
        assert_eq!(WriteOutcome::from_status(500), None);
    }

    #[test]
    fn test_response_success_range() {
        assert!(DavResponse::degraded(204).is_success());
        assert!(DavResponse::degraded(207).is_success());
        assert!(!DavResponse::degraded(404).is_success());
        assert!(!DavResponse::degraded(500).is_success());
    }

    #[test]
    fn test_entry_constructors() {
        let folder = DavEntry::folder("reports");
        assert!(folder.is_dir);
        assert_eq!(folder.size, 0);

        let file = DavEntry::file("notes.txt", 42);
        assert!(!file.is_dir);
        assert_eq!(file.size, 42);
    }
}
