//! WebDAV transport over `reqwest`.

use std::fmt;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use super::{path_segments, RemoteTransport, TransportError, TransportResult};
use crate::models::RemoteCredentials;
use crate::util::{compact_text, now_millis};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?><d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

/// WebDAV remote authenticated with HTTP basic auth
#[derive(Clone)]
pub struct WebDavTransport {
    base_url: String,
    principal: String,
    secret: String,
    client: reqwest::Client,
    staged_writes: bool,
}

impl fmt::Debug for WebDavTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WebDavTransport")
            .field("base_url", &self.base_url)
            .field("principal", &self.principal)
            .field("secret", &"[REDACTED]")
            .field("staged_writes", &self.staged_writes)
            .finish_non_exhaustive()
    }
}

impl WebDavTransport {
    /// Build a transport for the credentials' base address
    pub fn new(credentials: &RemoteCredentials, timeout: Duration) -> TransportResult<Self> {
        let base_url = normalize_base_url(&credentials.base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            principal: credentials.principal.clone(),
            secret: credentials.secret.clone(),
            client,
            staged_writes: false,
        })
    }

    /// Upload to a temporary object and `MOVE` it over the target.
    ///
    /// For servers whose `PUT` does not replace the object atomically.
    #[must_use]
    pub const fn with_staged_writes(mut self, staged_writes: bool) -> Self {
        self.staged_writes = staged_writes;
        self
    }

    fn object_url(&self, path: &str) -> TransportResult<String> {
        let encoded: Vec<String> = path_segments(path)?
            .into_iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        Ok(format!("{}/{}", self.base_url, encoded.join("/")))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.principal, Some(&self.secret))
    }

    async fn mkcol(&self, url: &str) -> TransportResult<()> {
        let response = self.request(dav_method("MKCOL")?, url).send().await?;
        match response.status() {
            // 405: the collection already exists
            status if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED => Ok(()),
            _ => Err(status_error("MKCOL", url, response).await),
        }
    }

    async fn put(&self, url: &str, bytes: &[u8]) -> TransportResult<()> {
        let response = self
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(bytes.to_vec())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error("PUT", url, response).await)
        }
    }

    async fn staged_put(&self, url: &str, bytes: &[u8]) -> TransportResult<()> {
        let staging_url = format!("{url}.{}.part", now_millis().timestamp_millis());
        self.put(&staging_url, bytes).await?;

        let moved = self
            .request(dav_method("MOVE")?, &staging_url)
            .header("Destination", url)
            .header("Overwrite", "T")
            .send()
            .await;

        match moved {
            Ok(response) if response.status().is_success() => Ok(()),
            result => {
                if let Err(error) = self.request(Method::DELETE, &staging_url).send().await {
                    tracing::warn!("Failed to remove staged upload {staging_url}: {error}");
                }
                match result {
                    Ok(response) => Err(status_error("MOVE", url, response).await),
                    Err(error) => Err(error.into()),
                }
            }
        }
    }
}

impl RemoteTransport for WebDavTransport {
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()> {
        let mut url = self.base_url.clone();
        for segment in path_segments(collection)? {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
            self.mkcol(&format!("{url}/")).await?;
        }
        tracing::debug!("Ensured WebDAV collection {url}/");
        Ok(())
    }

    async fn exists(&self, object: &str) -> TransportResult<bool> {
        let url = self.object_url(object)?;
        let response = self
            .request(dav_method("PROPFIND")?, &url)
            .header("Depth", "0")
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
            .body(PROPFIND_BODY)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error("PROPFIND", &url, response).await),
        }
    }

    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>> {
        let url = self.object_url(object)?;
        let response = self.request(Method::GET, &url).send().await?;
        if !response.status().is_success() {
            return Err(status_error("GET", &url, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()> {
        let url = self.object_url(object)?;
        if self.staged_writes {
            self.staged_put(&url, bytes).await
        } else {
            self.put(&url, bytes).await
        }
    }
}

fn dav_method(name: &'static str) -> TransportResult<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|error| {
        TransportError::InvalidConfiguration(format!("Unsupported HTTP method {name}: {error}"))
    })
}

fn normalize_base_url(raw: &str) -> TransportResult<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(TransportError::InvalidConfiguration(
            "WebDAV base URL must not be empty".to_string(),
        ));
    }
    if !crate::util::is_http_url(&base) {
        return Err(TransportError::InvalidConfiguration(
            "WebDAV base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}

async fn status_error(operation: &'static str, target: &str, response: Response) -> TransportError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(operation, target, status, &body)
}

fn classify_status(
    operation: &'static str,
    target: &str,
    status: StatusCode,
    body: &str,
) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized {
            target: target.to_string(),
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => TransportError::NotFound(target.to_string()),
        _ => TransportError::Status {
            operation,
            target: target.to_string(),
            status: status.as_u16(),
            body: compact_text(body),
        },
    }
}
