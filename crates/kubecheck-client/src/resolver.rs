//! Hostname resolution through the system resolver

use kubecheck_core::{HostResolver, QueryError};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Resolves hostnames with `getaddrinfo` via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> Result<BTreeSet<IpAddr>, QueryError> {
        let addresses = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(|e| QueryError::Resolve {
                host: hostname.to_string(),
                message: e.to_string(),
            })?;
        let ips: BTreeSet<IpAddr> = addresses.map(|a| a.ip()).collect();
        tracing::debug!("{} resolved to {:?}", hostname, ips);
        Ok(ips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let ips = SystemResolver.resolve("127.0.0.1").await.unwrap();
        assert_eq!(ips.into_iter().collect::<Vec<_>>(), vec![IpAddr::from([127, 0, 0, 1])]);
    }
}
