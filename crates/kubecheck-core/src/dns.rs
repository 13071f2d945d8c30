//! External DNS consistency helpers

use std::collections::BTreeSet;
use std::net::IpAddr;

/// Annotation external-dns reads hostnames from on services
pub const HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/hostname";

/// Strip trailing dots
pub fn normalize_hostname(hostname: &str) -> &str {
    hostname.trim_end_matches('.')
}

/// Hostnames listed in an external-dns annotation value, sorted
pub fn annotation_hostnames(value: &str) -> Vec<String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let mut hosts: Vec<String> = compact
        .split(',')
        .map(normalize_hostname)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();
    hosts.sort();
    hosts.dedup();
    hosts
}

/// Whether `hostname` is `domain` or one of its subdomains
pub fn in_domain(hostname: &str, domain: &str) -> bool {
    match hostname.strip_suffix(domain) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

/// Ingress rule hosts that fall under one of the managed domains
pub fn managed_hostnames(hosts: &[String], domain_filter: &[String]) -> Vec<String> {
    hosts
        .iter()
        .map(|h| normalize_hostname(h))
        .filter(|h| !h.is_empty())
        .filter(|h| domain_filter.iter().any(|d| in_domain(h, d)))
        .map(str::to_string)
        .collect()
}

/// Difference between advertised and resolved addresses of one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDiff {
    /// Resolved but not advertised
    pub extra: BTreeSet<IpAddr>,
    /// Advertised but not resolved
    pub missing: BTreeSet<IpAddr>,
}

impl AddressDiff {
    pub fn between(advertised: &BTreeSet<IpAddr>, resolved: &BTreeSet<IpAddr>) -> Self {
        Self {
            extra: resolved.difference(advertised).copied().collect(),
            missing: advertised.difference(resolved).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extra.is_empty() && self.missing.is_empty()
    }

    /// Message fragments for one hostname, extra addresses first
    pub fn describe(&self, hostname: &str) -> Vec<String> {
        let mut parts = Vec::new();
        if !self.extra.is_empty() {
            parts.push(format!("{} has extra IPs [{}]", hostname, join(&self.extra)));
        }
        if !self.missing.is_empty() {
            parts.push(format!(
                "{} is missing IPs [{}]",
                hostname,
                join(&self.missing)
            ));
        }
        parts
    }
}

fn join(addresses: &BTreeSet<IpAddr>) -> String {
    addresses
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
