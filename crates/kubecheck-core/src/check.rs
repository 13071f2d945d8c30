//! Check catalogue
//!
//! A [`CheckConfig`] is built once at startup from command line options and
//! stays immutable for the rest of the run.

use crate::filter::ResourceFilter;
use crate::resource::ResourceKind;
use crate::verdict::{CheckText, SeverityPolicy};
use std::collections::BTreeSet;

/// Default service types audited by the endpoints check
pub const DEFAULT_SERVICE_TYPES: [&str; 2] = ["clusterip", "loadbalancer"];

/// Seconds in a day, for certificate expiration windows
pub const SECS_PER_DAY: i64 = 86_400;

/// Evaluation rule of a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Every node reports `Ready=True`
    NodeReady,
    /// Every pod reports `Ready=True`
    PodReady,
    /// No pod stays `Pending` longer than the threshold, no container
    /// restarts more often than allowed
    PodPending { pending_secs: i64, restarts: u32 },
    /// No container restarts more often than allowed
    PodRestarts { restarts: u32 },
    /// Running pods stay under their runtime thresholds
    PodRuntime {
        warn_secs: Option<i64>,
        critical_secs: Option<i64>,
    },
    /// Pods behind each requested service are running
    ServicePods,
    /// Services of the given (lowercase) types have backing endpoints
    ServiceEndpoints { types: BTreeSet<String> },
    /// Certificates do not expire within the window
    CertificateExpiry { window_secs: i64 },
    /// Service hostnames resolve to the load balancer addresses
    ExternalDnsServices,
    /// Ingress hostnames under the managed domains resolve to the load
    /// balancer addresses
    ExternalDnsIngresses { domain_filter: Vec<String> },
    /// The most recent job of each cronjob did not fail
    CronJobLastRun,
}

impl Rule {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Rule::NodeReady => ResourceKind::Node,
            Rule::PodReady
            | Rule::PodPending { .. }
            | Rule::PodRestarts { .. }
            | Rule::PodRuntime { .. } => ResourceKind::Pod,
            Rule::ServicePods | Rule::ServiceEndpoints { .. } | Rule::ExternalDnsServices => {
                ResourceKind::Service
            }
            Rule::CertificateExpiry { .. } => ResourceKind::Certificate,
            Rule::ExternalDnsIngresses { .. } => ResourceKind::Ingress,
            Rule::CronJobLastRun => ResourceKind::CronJob,
        }
    }

    /// Only the runtime check distinguishes warning from critical
    pub fn policy(&self) -> SeverityPolicy {
        match self {
            Rule::PodRuntime { .. } => SeverityPolicy::Graded,
            _ => SeverityPolicy::Single,
        }
    }

    pub fn text(&self) -> CheckText {
        match self {
            Rule::NodeReady => CheckText {
                name: "NodesReady",
                ok: "All nodes are reporting as ready",
                failure: "Nodes are not ready",
            },
            Rule::PodReady => CheckText {
                name: "PodsRunning",
                ok: "All pods are reporting as ready",
                failure: "Pods found in a non-ready state",
            },
            Rule::PodPending { .. } => CheckText {
                name: "PodsPending",
                ok: "All pods are reporting as ready",
                failure: "Pod restart or pending thresholds exceeded",
            },
            Rule::PodRestarts { .. } => CheckText {
                name: "PodsRestarting",
                ok: "All pods are under restart threshold",
                failure: "Pods exceeded restart threshold",
            },
            Rule::PodRuntime { .. } => CheckText {
                name: "PodsRuntime",
                ok: "All pods within threshold",
                failure: "Pods exceed runtime threshold",
            },
            Rule::ServicePods => CheckText {
                name: "ServiceAvailable",
                ok: "All services are reporting as up",
                failure: "Services are not ready",
            },
            Rule::ServiceEndpoints { .. } => CheckText {
                name: "ServiceEndpoints",
                ok: "All services are available",
                failure: "Services unavailable",
            },
            Rule::CertificateExpiry { .. } => CheckText {
                name: "Certificates",
                ok: "All certificates are valid and are not expiring soon",
                failure: "Certificates need attention",
            },
            Rule::ExternalDnsServices => CheckText {
                name: "ExternalDnsServices",
                ok: "No inconsistencies found",
                failure: "The following failures were detected",
            },
            Rule::ExternalDnsIngresses { .. } => CheckText {
                name: "ExternalDnsIngresses",
                ok: "No inconsistencies found",
                failure: "The following failures were detected",
            },
            Rule::CronJobLastRun => CheckText {
                name: "CronJobs",
                ok: "All cronjobs ran successfully",
                failure: "Cronjobs have failed",
            },
        }
    }
}

/// Everything a check needs to know before talking to the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub rule: Rule,
    pub filter: ResourceFilter,
    /// Label selector passed to the list call
    pub label_selector: Option<String>,
    /// Restrict list calls to one namespace
    pub namespace: Option<String>,
}

impl CheckConfig {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            filter: ResourceFilter::default(),
            label_selector: None,
            namespace: None,
        }
    }

    pub fn with_filter(mut self, filter: ResourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_label_selector(mut self, selector: Option<String>) -> Self {
        self.label_selector = selector.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|s| !s.is_empty());
        self
    }

    /// Message reported as unknown when a narrowing filter matched nothing
    ///
    /// Explicit name lists are handled separately: missing names are
    /// critical, not unknown.
    pub fn no_match_message(&self) -> Option<String> {
        let plural = self.rule.kind().plural();
        if let Some(selector) = &self.label_selector {
            return Some(format!(
                "The filter specified resulted in 0 {} ({})",
                plural, selector
            ));
        }
        if self.filter.namespaces.is_restricted() {
            return Some(format!("No {} found in the included namespaces", plural));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NameFilter;

    #[test]
    fn test_rule_kinds() {
        assert_eq!(Rule::NodeReady.kind(), ResourceKind::Node);
        assert_eq!(Rule::PodRestarts { restarts: 3 }.kind(), ResourceKind::Pod);
        assert_eq!(
            Rule::ExternalDnsIngresses {
                domain_filter: vec![]
            }
            .kind(),
            ResourceKind::Ingress
        );
        assert_eq!(Rule::CronJobLastRun.kind(), ResourceKind::CronJob);
    }

    #[test]
    fn test_only_runtime_is_graded() {
        let runtime = Rule::PodRuntime {
            warn_secs: Some(10),
            critical_secs: Some(20),
        };
        assert_eq!(runtime.policy(), SeverityPolicy::Graded);
        assert_eq!(Rule::PodReady.policy(), SeverityPolicy::Single);
    }

    #[test]
    fn test_blank_selector_is_dropped() {
        let config = CheckConfig::new(Rule::PodReady).with_label_selector(Some("  ".to_string()));
        assert_eq!(config.label_selector, None);
        assert_eq!(config.no_match_message(), None);
    }

    #[test]
    fn test_no_match_message() {
        let config = CheckConfig::new(Rule::PodReady)
            .with_label_selector(Some("app=web".to_string()));
        assert_eq!(
            config.no_match_message().as_deref(),
            Some("The filter specified resulted in 0 pods (app=web)")
        );

        let config = CheckConfig::new(Rule::PodReady).with_filter(ResourceFilter::new(
            NameFilter::default(),
            NameFilter::from_lists("shop", ""),
        ));
        assert!(config.no_match_message().is_some());
    }
}
