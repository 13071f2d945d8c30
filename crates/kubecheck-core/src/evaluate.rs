//! Condition evaluation
//!
//! Turns one resource snapshot into outcomes. A resource that should not
//! be reported at all (a drained node, a completed pod) yields no outcome.
//! Rules that need a per-resource lookup receive its result as a
//! [`Lookup`]; lookup failures stay local to the resource.

use crate::cert;
use crate::check::{Rule, SECS_PER_DAY};
use crate::dns::{self, AddressDiff};
use crate::error::QueryError;
use crate::resource::{
    CertificateStatus, ConditionStatus, CronJobStatus, EndpointsSnapshot, NodeStatus, PodPhase,
    PodStatus, READY, Resource, ResourceStatus, ServiceStatus, elapsed_secs,
};
use crate::verdict::Outcome;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Result of the sub-query a rule needs for one resource
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The rule needs nothing beyond the snapshot
    None,
    /// Endpoints object addressed by the service name and namespace
    Endpoints(Result<Option<EndpointsSnapshot>, QueryError>),
    /// Pods matched by the service selector
    Pods(Result<Vec<Resource>, QueryError>),
    /// Resolved addresses per hostname
    Dns(Vec<(String, Result<BTreeSet<IpAddr>, QueryError>)>),
}

/// Whether `rule` has anything to say about `resource`
///
/// Resources rejected here are not counted as matched.
pub fn applies(rule: &Rule, resource: &Resource) -> bool {
    match (rule, &resource.status) {
        (Rule::ServiceEndpoints { types }, ResourceStatus::Service(service)) => {
            types.contains(&service.service_type.to_lowercase())
        }
        (Rule::ExternalDnsServices, _) | (Rule::ExternalDnsIngresses { .. }, _) => {
            dns_targets(rule, resource)
                .map(|(hosts, addresses)| !hosts.is_empty() && !addresses.is_empty())
                .unwrap_or(false)
        }
        _ => true,
    }
}

/// Hostnames to resolve and the addresses they should resolve to
pub fn dns_targets(rule: &Rule, resource: &Resource) -> Option<(Vec<String>, BTreeSet<IpAddr>)> {
    match (rule, &resource.status) {
        (Rule::ExternalDnsServices, ResourceStatus::Service(service)) => Some((
            service.hostnames.clone(),
            service.addresses.iter().copied().collect(),
        )),
        (Rule::ExternalDnsIngresses { domain_filter }, ResourceStatus::Ingress(ingress)) => Some((
            dns::managed_hostnames(&ingress.hosts, domain_filter),
            ingress.addresses.iter().copied().collect(),
        )),
        _ => None,
    }
}

/// Evaluate one resource under `rule`
pub fn evaluate(rule: &Rule, resource: &Resource, lookup: Lookup, now: DateTime<Utc>) -> Vec<Outcome> {
    match (rule, &resource.status) {
        (Rule::NodeReady, ResourceStatus::Node(node)) => node_ready(resource, node),
        (Rule::PodReady, ResourceStatus::Pod(pod)) => pod_ready(resource, pod),
        (Rule::PodPending { pending_secs, restarts }, ResourceStatus::Pod(pod)) => {
            let mut outcomes = pod_pending(resource, pod, *pending_secs, now);
            outcomes.extend(pod_restarts(resource, pod, *restarts));
            outcomes
        }
        (Rule::PodRestarts { restarts }, ResourceStatus::Pod(pod)) => {
            pod_restarts(resource, pod, *restarts)
        }
        (
            Rule::PodRuntime {
                warn_secs,
                critical_secs,
            },
            ResourceStatus::Pod(pod),
        ) => pod_runtime(resource, pod, *warn_secs, *critical_secs, now),
        (Rule::ServicePods, ResourceStatus::Service(_)) => service_pods(resource, lookup),
        (Rule::ServiceEndpoints { .. }, ResourceStatus::Service(service)) => {
            service_endpoints(resource, service, lookup)
        }
        (Rule::CertificateExpiry { window_secs }, ResourceStatus::Certificate(certificate)) => {
            certificate_expiry(resource, certificate, *window_secs, now)
        }
        (Rule::ExternalDnsServices, ResourceStatus::Service(_))
        | (Rule::ExternalDnsIngresses { .. }, ResourceStatus::Ingress(_)) => {
            let advertised = dns_targets(rule, resource)
                .map(|(_, addresses)| addresses)
                .unwrap_or_default();
            dns_consistency(resource, &advertised, lookup)
        }
        (Rule::CronJobLastRun, ResourceStatus::CronJob(cronjob)) => {
            cronjob_last_run(resource, cronjob)
        }
        _ => vec![Outcome::unknown(
            resource.display_name(),
            format!("{} cannot be evaluated by this check", resource.kind()),
        )],
    }
}

fn node_ready(resource: &Resource, node: &NodeStatus) -> Vec<Outcome> {
    match node.conditions.get(READY) {
        None => vec![Outcome::unknown(&resource.name, "no status reported")],
        Some(ConditionStatus::True) => vec![Outcome::healthy(&resource.name)],
        Some(_) if node.unschedulable => {
            tracing::debug!("Skipping cordoned node {}", resource.name);
            Vec::new()
        }
        Some(_) => vec![Outcome::critical(&resource.name, "not ready")],
    }
}

fn pod_ready(resource: &Resource, pod: &PodStatus) -> Vec<Outcome> {
    if pod.phase == PodPhase::Succeeded {
        return Vec::new();
    }
    match pod.conditions.get(READY) {
        Some(ConditionStatus::True) => vec![Outcome::healthy(&resource.name)],
        _ => vec![Outcome::critical(&resource.name, "not ready")],
    }
}

fn pod_pending(resource: &Resource, pod: &PodStatus, threshold: i64, now: DateTime<Utc>) -> Vec<Outcome> {
    if pod.phase != PodPhase::Pending {
        return vec![Outcome::healthy(&resource.name)];
    }
    let Some(created_at) = pod.created_at else {
        return vec![Outcome::unknown(&resource.name, "no creation timestamp")];
    };

    let pending = elapsed_secs(now, created_at);
    if pending > threshold {
        vec![Outcome::critical(
            &resource.name,
            format!("pending too long ({}s)", pending),
        )]
    } else {
        vec![Outcome::healthy(&resource.name)]
    }
}

/// One degraded outcome per offending container, keyed by container name
fn pod_restarts(resource: &Resource, pod: &PodStatus, threshold: u32) -> Vec<Outcome> {
    let outcomes: Vec<Outcome> = pod
        .containers
        .iter()
        .filter(|c| c.restart_count > threshold)
        .map(|c| {
            Outcome::critical(
                &c.name,
                format!("excessive restarts ({}) in {}", c.restart_count, resource.display_name()),
            )
        })
        .collect();

    if outcomes.is_empty() {
        vec![Outcome::healthy(&resource.name)]
    } else {
        outcomes
    }
}

fn pod_runtime(
    resource: &Resource,
    pod: &PodStatus,
    warn_secs: Option<i64>,
    critical_secs: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<Outcome> {
    if pod.phase != PodPhase::Running {
        return vec![Outcome::healthy(&resource.name)];
    }
    let Some(started_at) = pod.started_at else {
        return vec![Outcome::unknown(&resource.name, "no start time")];
    };

    let runtime = elapsed_secs(now, started_at);
    if let Some(limit) = critical_secs.filter(|limit| runtime > *limit) {
        return vec![Outcome::critical(
            &resource.name,
            format!("exceeds threshold {}", limit),
        )];
    }
    if let Some(limit) = warn_secs.filter(|limit| runtime > *limit) {
        return vec![Outcome::warning(
            &resource.name,
            format!("exceeds threshold {}", limit),
        )];
    }
    vec![Outcome::healthy(&resource.name)]
}

fn service_pods(resource: &Resource, lookup: Lookup) -> Vec<Outcome> {
    match lookup {
        Lookup::Pods(Ok(pods)) => {
            let outcomes: Vec<Outcome> = pods
                .iter()
                .filter_map(|pod| match &pod.status {
                    ResourceStatus::Pod(status) if status.phase != PodPhase::Running => Some(
                        Outcome::critical(&pod.name, status.phase.to_string().to_lowercase()),
                    ),
                    _ => None,
                })
                .collect();
            if outcomes.is_empty() {
                vec![Outcome::healthy(&resource.name)]
            } else {
                outcomes
            }
        }
        Lookup::Pods(Err(e)) => vec![Outcome::critical(
            &resource.name,
            format!("pod lookup failed: {}", e),
        )],
        _ => vec![Outcome::unknown(&resource.name, "no pod selector")],
    }
}

fn service_endpoints(resource: &Resource, service: &ServiceStatus, lookup: Lookup) -> Vec<Outcome> {
    let subject = resource.display_name();
    match lookup {
        Lookup::Endpoints(Ok(Some(endpoints))) if endpoints.subsets == 0 => {
            vec![Outcome::critical(subject, "no backing endpoints")]
        }
        Lookup::Endpoints(Ok(Some(_))) => vec![Outcome::healthy(subject)],
        // Without a selector nothing will ever create the object
        Lookup::Endpoints(Ok(None)) if service.selector.is_empty() => {
            vec![Outcome::critical(subject, "no endpoints object")]
        }
        Lookup::Endpoints(Ok(None)) => vec![Outcome::unknown(subject, "no endpoints object")],
        Lookup::Endpoints(Err(e)) => vec![Outcome::unknown(
            subject,
            format!("endpoint lookup failed: {}", e),
        )],
        _ => vec![Outcome::unknown(subject, "endpoints were not looked up")],
    }
}

fn certificate_expiry(
    resource: &Resource,
    certificate: &CertificateStatus,
    window_secs: i64,
    now: DateTime<Utc>,
) -> Vec<Outcome> {
    let subject = resource.display_name();
    let Some(payload) = &certificate.payload else {
        return vec![Outcome::unknown(subject, "no tls.crt data")];
    };

    let expiry = match cert::not_after(payload) {
        Ok(expiry) => expiry,
        Err(e) => return vec![Outcome::unknown(subject, format!("unparseable: {}", e))],
    };

    let remaining = (expiry - now).num_seconds();
    if remaining <= 0 {
        vec![Outcome::critical(subject, format!("expired {}", expiry.to_rfc3339()))]
    } else if remaining < window_secs {
        vec![Outcome::critical(
            subject,
            format!("expiring soon ({} days left)", remaining / SECS_PER_DAY),
        )]
    } else {
        vec![Outcome::healthy(subject)]
    }
}

fn dns_consistency(resource: &Resource, advertised: &BTreeSet<IpAddr>, lookup: Lookup) -> Vec<Outcome> {
    let subject = resource.display_name();
    let Lookup::Dns(resolved) = lookup else {
        return vec![Outcome::unknown(subject, "hostnames were not resolved")];
    };

    let mut parts = Vec::new();
    for (hostname, result) in resolved {
        match result {
            Ok(actual) => parts.extend(AddressDiff::between(advertised, &actual).describe(&hostname)),
            Err(e) => {
                tracing::debug!("{}", e);
                parts.push(format!("{} could not be resolved", hostname));
            }
        }
    }

    if parts.is_empty() {
        vec![Outcome::healthy(subject)]
    } else {
        vec![Outcome::critical(subject, parts.join(", "))]
    }
}

/// The most recent finished job decides; a cronjob that never finished a
/// run is healthy
fn cronjob_last_run(resource: &Resource, cronjob: &CronJobStatus) -> Vec<Outcome> {
    if cronjob.suspended {
        tracing::debug!("Skipping suspended cronjob {}", resource.display_name());
        return Vec::new();
    }
    let subject = resource.display_name();
    let last = cronjob
        .jobs
        .iter()
        .filter(|job| job.failed || job.complete)
        .max_by_key(|job| job.created_at);
    match last {
        Some(job) if job.failed => vec![Outcome::critical(
            subject,
            format!("last job {} failed", job.name),
        )],
        _ => vec![Outcome::healthy(subject)],
    }
}
