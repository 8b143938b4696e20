//! Connectivity checks run before any transport call.

use std::time::Duration;

use tokio::net::TcpStream;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Answers whether the remote is reachable at all
#[allow(async_fn_in_trait)]
pub trait NetworkProbe {
    /// `remote_url` is the configured remote address, if any
    async fn is_online(&self, remote_url: Option<&str>) -> bool;
}

/// Probe that always reports connectivity
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl NetworkProbe for AssumeOnline {
    async fn is_online(&self, _remote_url: Option<&str>) -> bool {
        true
    }
}

/// Probe that opens a TCP connection to the remote host
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl TcpProbe {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl NetworkProbe for TcpProbe {
    async fn is_online(&self, remote_url: Option<&str>) -> bool {
        // Nothing to probe: local remotes and missing addresses are left to later checks.
        let Some(address) = remote_url.and_then(socket_address) else {
            return true;
        };

        match tokio::time::timeout(self.timeout, TcpStream::connect(address.as_str())).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::debug!("Connectivity probe to {address} failed: {error}");
                false
            }
            Err(_) => {
                tracing::debug!("Connectivity probe to {address} timed out");
                false
            }
        }
    }
}

/// `host:port` of an http(s) URL
fn socket_address(url: &str) -> Option<String> {
    let url = url.trim();
    let (rest, default_port) = if let Some(rest) = url.strip_prefix("https://") {
        (rest, 443)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (rest, 80)
    } else {
        return None;
    };

    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if host_port.is_empty() {
        return None;
    }

    // Bracketed IPv6 literals carry colons of their own.
    let has_port = if host_port.starts_with('[') {
        host_port.contains("]:")
    } else {
        host_port.rsplit_once(':').is_some_and(|(_, port)| {
            !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
        })
    };

    if has_port {
        Some(host_port.to_string())
    } else {
        Some(format!("{host_port}:{default_port}"))
    }
}
