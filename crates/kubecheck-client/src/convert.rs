//! Conversion of API objects into resource snapshots

use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Endpoints, LoadBalancerIngress, Node, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubecheck_core::dns::{HOSTNAME_ANNOTATION, annotation_hostnames};
use kubecheck_core::{
    CertificateStatus, ConditionStatus, Conditions, ContainerStatus, CronJobStatus,
    EndpointsSnapshot, IngressStatus, JobSnapshot, NodeStatus, PodPhase, PodStatus, Resource,
    ResourceStatus, ServiceStatus,
};
use std::net::IpAddr;

/// Secret data key holding the certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

fn name_of(meta: &ObjectMeta) -> (String, String) {
    (
        meta.name.clone().unwrap_or_default(),
        meta.namespace.clone().unwrap_or_default(),
    )
}

fn conditions<'a>(entries: impl Iterator<Item = (&'a str, &'a str)>) -> Conditions {
    entries
        .map(|(type_, status)| (type_.to_string(), ConditionStatus::parse(status)))
        .collect()
}

/// Parseable IPs of load balancer ingress points, hostnames are ignored
fn ingress_ips<'a>(points: impl Iterator<Item = Option<&'a String>>) -> Vec<IpAddr> {
    let mut ips: Vec<IpAddr> = points.flatten().filter_map(|ip| ip.parse().ok()).collect();
    ips.sort();
    ips
}

pub fn node(node: &Node) -> Resource {
    let (name, _) = name_of(&node.metadata);
    let status = node.status.as_ref();

    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|list| conditions(list.iter().map(|c| (c.type_.as_str(), c.status.as_str()))))
        .unwrap_or_default();
    let unschedulable = node
        .spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false);

    Resource::new(
        name,
        "",
        ResourceStatus::Node(NodeStatus {
            conditions,
            unschedulable,
        }),
    )
}

pub fn pod(pod: &Pod) -> Resource {
    let (name, namespace) = name_of(&pod.metadata);
    let status = pod.status.as_ref();

    let phase = status
        .and_then(|s| s.phase.as_deref())
        .map(PodPhase::parse)
        .unwrap_or_default();
    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|list| conditions(list.iter().map(|c| (c.type_.as_str(), c.status.as_str()))))
        .unwrap_or_default();
    let containers = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|list| {
            list.iter()
                .map(|c| ContainerStatus {
                    name: c.name.clone(),
                    restart_count: u32::try_from(c.restart_count).unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();

    Resource::new(
        name,
        namespace,
        ResourceStatus::Pod(PodStatus {
            phase,
            conditions,
            created_at: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
            started_at: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
            containers,
        }),
    )
}

pub fn service(service: &Service) -> Resource {
    let (name, namespace) = name_of(&service.metadata);
    let spec = service.spec.as_ref();

    let hostnames = service
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(HOSTNAME_ANNOTATION))
        .map(|value| annotation_hostnames(value))
        .unwrap_or_default();
    let addresses = service
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|points| ingress_ips(points.iter().map(|p: &LoadBalancerIngress| p.ip.as_ref())))
        .unwrap_or_default();

    Resource::new(
        name,
        namespace,
        ResourceStatus::Service(ServiceStatus {
            service_type: spec
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
            selector: spec
                .and_then(|s| s.selector.clone())
                .map(|m| m.into_iter().collect())
                .unwrap_or_default(),
            hostnames,
            addresses,
        }),
    )
}

pub fn ingress(ingress: &Ingress) -> Resource {
    let (name, namespace) = name_of(&ingress.metadata);

    let hosts = ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .map(|rules| rules.iter().filter_map(|r| r.host.clone()).collect())
        .unwrap_or_default();
    let addresses = ingress
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|points| ingress_ips(points.iter().map(|p| p.ip.as_ref())))
        .unwrap_or_default();

    Resource::new(
        name,
        namespace,
        ResourceStatus::Ingress(IngressStatus { hosts, addresses }),
    )
}

/// Whether a secret is managed by cert-manager
pub fn is_cert_manager_secret(secret: &Secret) -> bool {
    secret
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| {
            a.keys()
                .any(|k| k.contains("certmanager") || k.contains("cert-manager.io"))
        })
}

pub fn certificate(secret: &Secret) -> Resource {
    let (name, namespace) = name_of(&secret.metadata);
    let payload = secret
        .data
        .as_ref()
        .and_then(|d| d.get(TLS_CERT_KEY))
        .map(|bytes| bytes.0.clone());

    Resource::new(
        name,
        namespace,
        ResourceStatus::Certificate(CertificateStatus { payload }),
    )
}

fn job_condition(job: &Job, type_: &str) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|list| list.iter().any(|c| c.type_ == type_ && c.status == "True"))
}

/// Whether `job` was created by the cronjob `name` in `namespace`
fn owned_by(job: &Job, name: &str, namespace: &str) -> bool {
    job.metadata.namespace.as_deref().unwrap_or_default() == namespace
        && job
            .metadata
            .owner_references
            .as_ref()
            .is_some_and(|refs| refs.iter().any(|r| r.kind == "CronJob" && r.name == name))
}

/// Snapshot of a cronjob with the jobs it owns
pub fn cronjob(cronjob: &CronJob, jobs: &[Job]) -> Resource {
    let (name, namespace) = name_of(&cronjob.metadata);

    let owned = jobs
        .iter()
        .filter(|job| owned_by(job, &name, &namespace))
        .map(|job| JobSnapshot {
            name: job.metadata.name.clone().unwrap_or_default(),
            created_at: job.metadata.creation_timestamp.as_ref().map(|t| t.0),
            failed: job_condition(job, "Failed"),
            complete: job_condition(job, "Complete"),
        })
        .collect();

    Resource::new(
        name,
        namespace,
        ResourceStatus::CronJob(CronJobStatus {
            suspended: cronjob
                .spec
                .as_ref()
                .and_then(|s| s.suspend)
                .unwrap_or(false),
            jobs: owned,
        }),
    )
}

/// Count subsets that carry at least one ready address
pub fn endpoints(endpoints: &Endpoints) -> EndpointsSnapshot {
    let subsets = endpoints
        .subsets
        .as_ref()
        .map(|list| {
            list.iter()
                .filter(|s| s.addresses.as_ref().is_some_and(|a| !a.is_empty()))
                .count()
        })
        .unwrap_or(0);
    EndpointsSnapshot { subsets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::ByteString;
    use k8s_openapi::api::batch::v1::{CronJobSpec, JobCondition, JobStatus};
    use k8s_openapi::api::core::v1::{
        ContainerStatus as K8sContainerStatus, EndpointAddress, EndpointSubset, LoadBalancerStatus,
        NodeCondition, NodeSpec, NodeStatus as K8sNodeStatus, PodCondition,
        PodStatus as K8sPodStatus, ServiceSpec, ServiceStatus as K8sServiceStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
    use std::collections::BTreeMap;

    fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_conversion() {
        let node = Node {
            metadata: meta("node-a", None),
            spec: Some(NodeSpec {
                unschedulable: Some(true),
                ..Default::default()
            }),
            status: Some(K8sNodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "False".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        };

        let resource = super::node(&node);
        let ResourceStatus::Node(status) = resource.status else {
            panic!("expected node status");
        };
        assert_eq!(resource.name, "node-a");
        assert!(status.unschedulable);
        assert_eq!(status.conditions.get("Ready"), Some(&ConditionStatus::False));
    }

    #[test]
    fn test_pod_conversion() {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let mut metadata = meta("web-0", Some("shop"));
        metadata.creation_timestamp = Some(Time(created));

        let pod = Pod {
            metadata,
            spec: None,
            status: Some(K8sPodStatus {
                phase: Some("Running".to_string()),
                start_time: Some(Time(created)),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                container_statuses: Some(vec![K8sContainerStatus {
                    name: "app".to_string(),
                    restart_count: 4,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        };

        let resource = super::pod(&pod);
        assert_eq!(resource.display_name(), "shop/web-0");
        let ResourceStatus::Pod(status) = resource.status else {
            panic!("expected pod status");
        };
        assert_eq!(status.phase, PodPhase::Running);
        assert_eq!(status.created_at, Some(created));
        assert_eq!(status.containers[0].restart_count, 4);
        assert_eq!(status.conditions.get("Ready"), Some(&ConditionStatus::True));
    }

    #[test]
    fn test_service_conversion() {
        let mut metadata = meta("web", Some("shop"));
        let mut annotations = BTreeMap::new();
        annotations.insert(
            HOSTNAME_ANNOTATION.to_string(),
            "shop.example.com., www.example.com".to_string(),
        );
        metadata.annotations = Some(annotations);

        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "web".to_string());

        let service = Service {
            metadata,
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                selector: Some(selector),
                ..Default::default()
            }),
            status: Some(K8sServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![
                        LoadBalancerIngress {
                            ip: Some("5.6.7.8".to_string()),
                            ..Default::default()
                        },
                        LoadBalancerIngress {
                            hostname: Some("lb.example.net".to_string()),
                            ..Default::default()
                        },
                    ]),
                }),
                ..Default::default()
            }),
        };

        let resource = super::service(&service);
        let ResourceStatus::Service(status) = resource.status else {
            panic!("expected service status");
        };
        assert_eq!(status.service_type, "LoadBalancer");
        assert_eq!(status.hostnames, vec!["shop.example.com", "www.example.com"]);
        assert_eq!(status.addresses, vec!["5.6.7.8".parse::<IpAddr>().unwrap()]);
        assert_eq!(status.selector_string().as_deref(), Some("app=web"));
    }

    #[test]
    fn test_certificate_secret() {
        let mut metadata = meta("tls", Some("shop"));
        let mut annotations = BTreeMap::new();
        annotations.insert(
            "cert-manager.io/issuer-name".to_string(),
            "letsencrypt".to_string(),
        );
        metadata.annotations = Some(annotations);

        let mut data = BTreeMap::new();
        data.insert(TLS_CERT_KEY.to_string(), ByteString(b"PEM".to_vec()));
        let secret = Secret {
            metadata,
            data: Some(data),
            ..Default::default()
        };

        assert!(is_cert_manager_secret(&secret));
        assert!(!is_cert_manager_secret(&Secret::default()));

        let ResourceStatus::Certificate(status) = super::certificate(&secret).status else {
            panic!("expected certificate status");
        };
        assert_eq!(status.payload.as_deref(), Some(&b"PEM"[..]));
    }

    #[test]
    fn test_cronjob_collects_owned_jobs() {
        let owner = |name: &str| OwnerReference {
            kind: "CronJob".to_string(),
            name: name.to_string(),
            ..Default::default()
        };
        let job = |name: &str, namespace: &str, cronjob: &str, failed: bool| {
            let mut metadata = meta(name, Some(namespace));
            metadata.owner_references = Some(vec![owner(cronjob)]);
            Job {
                metadata,
                spec: None,
                status: Some(JobStatus {
                    conditions: Some(vec![JobCondition {
                        type_: if failed { "Failed" } else { "Complete" }.to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            }
        };

        let cronjob = CronJob {
            metadata: meta("backup", Some("ops")),
            spec: Some(CronJobSpec {
                schedule: "0 * * * *".to_string(),
                ..Default::default()
            }),
            status: None,
        };
        let jobs = vec![
            job("backup-1", "ops", "backup", true),
            job("backup-2", "ops", "backup", false),
            job("backup-3", "other", "backup", true),
            job("report-1", "ops", "report", true),
        ];

        let ResourceStatus::CronJob(status) = super::cronjob(&cronjob, &jobs).status else {
            panic!("expected cronjob status");
        };
        let names: Vec<&str> = status.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["backup-1", "backup-2"]);
        assert!(status.jobs[0].failed);
        assert!(status.jobs[1].complete);
    }

    #[test]
    fn test_endpoints_count_ready_subsets() {
        let endpoints = Endpoints {
            metadata: meta("web", Some("shop")),
            subsets: Some(vec![
                EndpointSubset {
                    addresses: Some(vec![EndpointAddress {
                        ip: "10.0.0.5".to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
                EndpointSubset::default(),
            ]),
        };
        assert_eq!(super::endpoints(&endpoints).subsets, 1);
        assert_eq!(super::endpoints(&Endpoints::default()).subsets, 0);
    }
}
