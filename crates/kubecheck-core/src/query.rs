//! Cluster access ports
//!
//! The core never talks to the API server itself. A concrete client
//! implements these traits; tests use in-memory fakes.

use crate::error::QueryError;
use crate::resource::{EndpointsSnapshot, Resource, ResourceKind};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Scope of a list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    /// `None` lists across all namespaces
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
}

impl ListScope {
    pub fn new(namespace: Option<String>, label_selector: Option<String>) -> Self {
        Self {
            namespace,
            label_selector,
        }
    }
}

/// Read access to cluster resources
#[allow(async_fn_in_trait)]
pub trait ClusterQuery {
    /// List resources of one kind
    async fn list(&self, kind: ResourceKind, scope: &ListScope) -> Result<Vec<Resource>, QueryError>;

    /// Get the endpoints object of a service, `None` when it does not exist
    async fn endpoints(&self, name: &str, namespace: &str) -> Result<Option<EndpointsSnapshot>, QueryError>;
}

/// Hostname resolution
#[allow(async_fn_in_trait)]
pub trait HostResolver {
    async fn resolve(&self, hostname: &str) -> Result<BTreeSet<IpAddr>, QueryError>;
}
