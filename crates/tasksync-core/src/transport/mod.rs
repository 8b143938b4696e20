//! Remote transports for the task snapshot.
//!
//! A transport exposes a remote file store through four whole-object
//! operations. Every failure surfaces as a [`TransportError`]; a missing
//! object is reported as `Ok(false)` by [`RemoteTransport::exists`] and as
//! [`TransportError::NotFound`] by [`RemoteTransport::fetch`], never confused
//! with an unreachable remote.

mod directory;
mod memory;
mod probe;
mod webdav;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::models::RemoteCredentials;

pub use directory::DirectoryTransport;
pub use memory::{MemoryTransport, Operation};
pub use probe::{AssumeOnline, NetworkProbe, TcpProbe};
pub use webdav::WebDavTransport;

/// Default remote collection holding the task snapshot
pub const DEFAULT_COLLECTION: &str = "TaskSync";

/// Default object name of the task snapshot inside the collection
pub const DEFAULT_OBJECT_NAME: &str = "tasks.json";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by remote transports
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote address or object path cannot be used
    #[error("Invalid transport configuration: {0}")]
    InvalidConfiguration(String),

    /// The request never produced a response (DNS, TLS, timeout, reset)
    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote rejected the credentials
    #[error("Remote rejected credentials for {target} (HTTP {status})")]
    Unauthorized { target: String, status: u16 },

    /// The requested object does not exist
    #[error("Remote object not found: {0}")]
    NotFound(String),

    /// The remote answered with an unexpected status
    #[error("Remote {operation} failed for {target} (HTTP {status}): {body}")]
    Status {
        operation: &'static str,
        target: String,
        status: u16,
        body: String,
    },

    /// Filesystem failure on a directory-backed remote
    #[error("Remote IO error for {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote is temporarily unavailable
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Whole-object access to a remote store
///
/// Paths are `/`-separated and relative to the remote base address.
#[allow(async_fn_in_trait)]
pub trait RemoteTransport {
    /// Create the collection if it is absent. Idempotent.
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()>;

    /// Whether the object exists. Failures are errors, never `false`.
    async fn exists(&self, object: &str) -> TransportResult<bool>;

    /// Read the whole object
    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>>;

    /// Replace the whole object. A failed store leaves the prior object intact.
    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()>;
}

/// Builds a transport for one sync session from resolved credentials
pub trait TransportConnector {
    type Transport: RemoteTransport;

    /// Build a transport bound to the credentials' remote address
    fn connect(&self, credentials: &RemoteCredentials) -> TransportResult<Self::Transport>;
}

/// Where the snapshot lives on the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    /// Collection (folder) path
    pub collection: String,
    /// Object name inside the collection
    pub object_name: String,
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            object_name: DEFAULT_OBJECT_NAME.to_string(),
        }
    }
}

impl RemoteLayout {
    /// Full object path of the snapshot
    #[must_use]
    pub fn object_path(&self) -> String {
        let collection = self.collection.trim_matches('/');
        if collection.is_empty() {
            self.object_name.clone()
        } else {
            format!("{collection}/{}", self.object_name)
        }
    }
}

/// Scheme-dispatching transport built by [`Connector`]
#[derive(Debug, Clone)]
pub enum AnyTransport {
    WebDav(WebDavTransport),
    Directory(DirectoryTransport),
}

impl RemoteTransport for AnyTransport {
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()> {
        match self {
            Self::WebDav(transport) => transport.ensure_collection(collection).await,
            Self::Directory(transport) => transport.ensure_collection(collection).await,
        }
    }

    async fn exists(&self, object: &str) -> TransportResult<bool> {
        match self {
            Self::WebDav(transport) => transport.exists(object).await,
            Self::Directory(transport) => transport.exists(object).await,
        }
    }

    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>> {
        match self {
            Self::WebDav(transport) => transport.fetch(object).await,
            Self::Directory(transport) => transport.fetch(object).await,
        }
    }

    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()> {
        match self {
            Self::WebDav(transport) => transport.store(object, bytes).await,
            Self::Directory(transport) => transport.store(object, bytes).await,
        }
    }
}

/// Picks a transport from the remote address scheme.
///
/// `http://` and `https://` select WebDAV, `file://` a mounted directory.
#[derive(Debug, Clone)]
pub struct Connector {
    timeout: Duration,
    staged_writes: bool,
}

impl Default for Connector {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            staged_writes: false,
        }
    }
}

impl Connector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-request timeout for network transports
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upload to a temporary object and move it into place
    #[must_use]
    pub const fn with_staged_writes(mut self, staged_writes: bool) -> Self {
        self.staged_writes = staged_writes;
        self
    }
}

impl TransportConnector for Connector {
    type Transport = AnyTransport;

    fn connect(&self, credentials: &RemoteCredentials) -> TransportResult<AnyTransport> {
        let base_url = credentials.base_url.trim();
        if crate::util::is_http_url(base_url) {
            let transport = WebDavTransport::new(credentials, self.timeout)?
                .with_staged_writes(self.staged_writes);
            return Ok(AnyTransport::WebDav(transport));
        }
        if let Some(path) = base_url.strip_prefix("file://") {
            return Ok(AnyTransport::Directory(DirectoryTransport::new(path)));
        }
        Err(TransportError::InvalidConfiguration(format!(
            "unsupported remote address '{base_url}', expected http(s):// or file://"
        )))
    }
}

/// Split a remote path into non-empty segments, rejecting traversal
pub(crate) fn path_segments(path: &str) -> TransportResult<Vec<&str>> {
    let segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(TransportError::InvalidConfiguration(
            "remote path cannot be empty".to_string(),
        ));
    }
    if segments
        .iter()
        .any(|segment| *segment == "." || *segment == ".." || segment.contains('\\'))
    {
        return Err(TransportError::InvalidConfiguration(format!(
            "remote path '{path}' must not contain relative segments"
        )));
    }
    Ok(segments)
}

/// Join remote path segments below a local root
pub(crate) fn local_path(root: &Path, path: &str) -> TransportResult<PathBuf> {
    let mut resolved = root.to_path_buf();
    for segment in path_segments(path)? {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => resolved.push(part),
            _ => {
                return Err(TransportError::InvalidConfiguration(format!(
                    "remote path segment '{segment}' is not a plain name"
                )))
            }
        }
    }
    Ok(resolved)
}
