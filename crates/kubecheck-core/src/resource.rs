//! Resource snapshots
//!
//! These types are read-only views of cluster objects, built once per
//! check invocation from a list response and discarded at exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Kind of cluster object a check looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Node,
    Pod,
    Service,
    CronJob,
    Certificate,
    Ingress,
}

impl ResourceKind {
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Node => "nodes",
            ResourceKind::Pod => "pods",
            ResourceKind::Service => "services",
            ResourceKind::CronJob => "cronjobs",
            ResourceKind::Certificate => "certificates",
            ResourceKind::Ingress => "ingresses",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Node => write!(f, "node"),
            ResourceKind::Pod => write!(f, "pod"),
            ResourceKind::Service => write!(f, "service"),
            ResourceKind::CronJob => write!(f, "cronjob"),
            ResourceKind::Certificate => write!(f, "certificate"),
            ResourceKind::Ingress => write!(f, "ingress"),
        }
    }
}

/// Status value of a typed condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

/// Conditions keyed by condition type (e.g. `Ready`)
pub type Conditions = BTreeMap<String, ConditionStatus>;

/// Condition type shared by nodes and pods
pub const READY: &str = "Ready";

/// A named cluster object with kind-specific status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    /// Empty for cluster-scoped objects
    pub namespace: String,
    pub status: ResourceStatus,
}

impl Resource {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            status,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.status.kind()
    }

    /// `namespace/name`, or the bare name for cluster-scoped objects
    pub fn display_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }
}

/// Kind-specific status data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResourceStatus {
    Node(NodeStatus),
    Pod(PodStatus),
    Service(ServiceStatus),
    CronJob(CronJobStatus),
    Certificate(CertificateStatus),
    Ingress(IngressStatus),
}

impl ResourceStatus {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceStatus::Node(_) => ResourceKind::Node,
            ResourceStatus::Pod(_) => ResourceKind::Pod,
            ResourceStatus::Service(_) => ResourceKind::Service,
            ResourceStatus::CronJob(_) => ResourceKind::CronJob,
            ResourceStatus::Certificate(_) => ResourceKind::Certificate,
            ResourceStatus::Ingress(_) => ResourceKind::Ingress,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    pub conditions: Conditions,
    /// Cordoned nodes are intentionally out of rotation
    pub unschedulable: bool,
}

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub fn parse(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodStatus {
    pub phase: PodPhase,
    pub conditions: Conditions,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub containers: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub restart_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// `ClusterIP`, `LoadBalancer`, `NodePort` or `ExternalName`
    pub service_type: String,
    pub selector: BTreeMap<String, String>,
    /// Hostnames published through external-dns
    pub hostnames: Vec<String>,
    /// Load balancer ingress IPs
    pub addresses: Vec<IpAddr>,
}

impl ServiceStatus {
    /// Label selector matching the backing pods, if the service has one
    pub fn selector_string(&self) -> Option<String> {
        if self.selector.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        Some(parts.join(","))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressStatus {
    /// Rule hosts as declared on the ingress
    pub hosts: Vec<String>,
    pub addresses: Vec<IpAddr>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateStatus {
    /// Decoded `tls.crt` secret data, PEM or DER
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronJobStatus {
    pub suspended: bool,
    /// Jobs owned by this cronjob
    pub jobs: Vec<JobSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    /// `Failed` condition is `True`
    pub failed: bool,
    /// `Complete` condition is `True`
    pub complete: bool,
}

/// Endpoints object backing a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsSnapshot {
    /// Subsets carrying at least one ready address
    pub subsets: usize,
}

/// Whole seconds elapsed from `since` to `now`, floored
pub fn elapsed_secs(now: DateTime<Utc>, since: DateTime<Utc>) -> i64 {
    (now - since).num_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_name() {
        let node = Resource::new("node-a", "", ResourceStatus::Node(NodeStatus::default()));
        assert_eq!(node.display_name(), "node-a");

        let pod = Resource::new("web-0", "shop", ResourceStatus::Pod(PodStatus::default()));
        assert_eq!(pod.display_name(), "shop/web-0");
        assert_eq!(pod.kind(), ResourceKind::Pod);
    }

    #[test]
    fn test_selector_string() {
        let mut service = ServiceStatus::default();
        assert_eq!(service.selector_string(), None);

        service.selector.insert("app".to_string(), "web".to_string());
        service.selector.insert("tier".to_string(), "front".to_string());
        assert_eq!(service.selector_string().as_deref(), Some("app=web,tier=front"));
    }

    #[test]
    fn test_elapsed_secs_floors() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = since + chrono::Duration::milliseconds(10_999);
        assert_eq!(elapsed_secs(now, since), 10);
    }

    #[test]
    fn test_parse_states() {
        assert_eq!(ConditionStatus::parse("True"), ConditionStatus::True);
        assert_eq!(ConditionStatus::parse("False"), ConditionStatus::False);
        assert_eq!(ConditionStatus::parse("maybe"), ConditionStatus::Unknown);
        assert_eq!(PodPhase::parse("Succeeded"), PodPhase::Succeeded);
        assert_eq!(PodPhase::parse(""), PodPhase::Unknown);
    }
}
