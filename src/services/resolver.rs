use crate::utils::error::{ForwardError, Result};
use std::net::{IpAddr, SocketAddr};

/// A resolved SSH server address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedHost {
    pub address: SocketAddr,
}

impl ResolvedHost {
    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }
}

/// Turns a host name or literal address into a socket address.
pub struct HostResolver;

impl HostResolver {
    /// Literal IPs are used as-is; anything else goes through the system
    /// resolver and the first answer wins.
    pub async fn resolve(host: &str, port: u16) -> Result<ResolvedHost> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ForwardError::Resolve {
                host: String::new(),
                reason: "host is empty".to_string(),
            });
        }

        if let Some(ip) = parse_literal(host) {
            return Ok(ResolvedHost {
                address: SocketAddr::new(ip, port),
            });
        }

        let mut answers = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ForwardError::Resolve {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let address = answers.next().ok_or_else(|| ForwardError::Resolve {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        })?;

        tracing::debug!("Resolved {} to {}", host, address.ip());
        Ok(ResolvedHost { address })
    }
}

/// Accepts `10.0.0.1`, `::1` and the bracketed `[::1]` form
fn parse_literal(host: &str) -> Option<IpAddr> {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse().ok()
}
