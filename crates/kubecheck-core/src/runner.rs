//! Check execution
//!
//! One list call, then a sequential pass over the results with at most one
//! sub-query per resource. Nothing is retried.

use crate::check::{CheckConfig, Rule};
use crate::error::QueryError;
use crate::evaluate::{self, Lookup};
use crate::query::{ClusterQuery, HostResolver, ListScope};
use crate::resource::{Resource, ResourceKind, ResourceStatus};
use crate::verdict::{Aggregator, Status, Verdict};
use chrono::{DateTime, Utc};

/// Verdict for a failure that prevented listing resources at all
pub fn fatal(error: &QueryError) -> Verdict {
    match error {
        QueryError::Connection(message) => Verdict::new(
            Status::Warning,
            format!("Unable to connect to Kubernetes API server: {}", message),
        ),
        // The objects are unreadable, not rejected
        QueryError::Decode(message) => Verdict::new(
            Status::Unknown,
            format!("Unable to determine status: {}", message),
        ),
        other => Verdict::new(Status::Critical, format!("API error: {}", other)),
    }
}

/// Run one check against the cluster
pub async fn run_check<Q, R>(
    query: &Q,
    resolver: &R,
    config: &CheckConfig,
    now: DateTime<Utc>,
) -> Verdict
where
    Q: ClusterQuery,
    R: HostResolver,
{
    let rule = &config.rule;
    let kind = rule.kind();
    let scope = ListScope::new(config.namespace.clone(), config.label_selector.clone());

    let resources = match query.list(kind, &scope).await {
        Ok(resources) => resources,
        Err(e) => {
            tracing::error!("Failed to list {}: {}", kind.plural(), e);
            return fatal(&e);
        }
    };
    tracing::debug!("Listed {} {}", resources.len(), kind.plural());

    let mut aggregator = Aggregator::new(rule.policy()).require(config.filter.names.requested());

    for resource in &resources {
        if !config.filter.included(&resource.name, &resource.namespace) {
            continue;
        }
        aggregator.record(&resource.name);
        if !evaluate::applies(rule, resource) {
            tracing::debug!("{} {} not applicable", kind, resource.display_name());
            continue;
        }

        let lookup = lookup(query, resolver, rule, resource).await;
        let outcomes = evaluate::evaluate(rule, resource, lookup, now);
        for outcome in &outcomes {
            if !outcome.is_healthy() {
                tracing::info!("{}", outcome.describe());
            }
        }
        aggregator.extend(outcomes);
    }

    aggregator.finish(&rule.text(), config.no_match_message())
}

/// Perform the sub-query `rule` needs for `resource`
async fn lookup<Q, R>(query: &Q, resolver: &R, rule: &Rule, resource: &Resource) -> Lookup
where
    Q: ClusterQuery,
    R: HostResolver,
{
    match (rule, &resource.status) {
        (Rule::ServiceEndpoints { .. }, ResourceStatus::Service(_)) => Lookup::Endpoints(
            query
                .endpoints(&resource.name, &resource.namespace)
                .await,
        ),
        (Rule::ServicePods, ResourceStatus::Service(service)) => match service.selector_string() {
            Some(selector) => {
                let scope = ListScope::new(Some(resource.namespace.clone()), Some(selector));
                Lookup::Pods(query.list(ResourceKind::Pod, &scope).await)
            }
            None => Lookup::None,
        },
        (Rule::ExternalDnsServices, _) | (Rule::ExternalDnsIngresses { .. }, _) => {
            let hostnames = evaluate::dns_targets(rule, resource)
                .map(|(hostnames, _)| hostnames)
                .unwrap_or_default();
            let mut resolved = Vec::with_capacity(hostnames.len());
            for hostname in hostnames {
                let result = resolver.resolve(&hostname).await;
                resolved.push((hostname, result));
            }
            Lookup::Dns(resolved)
        }
        _ => Lookup::None,
    }
}
