//! Command line interface

use clap::{Args, Parser, Subcommand};
use kubecheck_client::ConnectionOptions;
use kubecheck_core::check::{DEFAULT_SERVICE_TYPES, SECS_PER_DAY};
use kubecheck_core::filter::parse_list;
use kubecheck_core::{CheckConfig, NameFilter, ResourceFilter, Rule};
use std::path::PathBuf;

/// kubecheck: monitoring checks for Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "kubecheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Log file path (default: stderr)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// How to reach the API server
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// URL of the API server
    #[arg(short = 's', long, env = "KUBERNETES_MASTER", global = true)]
    pub api_server: Option<String>,

    /// Use service account authentication
    #[arg(long, global = true)]
    pub in_cluster: bool,

    /// CA file to verify the API server certificate
    #[arg(long, global = true)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate
    #[arg(long, global = true)]
    pub cert: Option<PathBuf>,

    /// Client key for the certificate
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    /// User for basic authentication
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Password for basic authentication
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// File containing a bearer token
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Path to a kubeconfig file
    #[arg(long, global = true)]
    pub kube_config: Option<PathBuf>,

    /// Only query the namespace of the running pod
    #[arg(long, global = true)]
    pub in_namespace: bool,
}

impl From<ConnectionArgs> for ConnectionOptions {
    fn from(args: ConnectionArgs) -> Self {
        ConnectionOptions {
            api_server: args.api_server,
            in_cluster: args.in_cluster,
            ca_file: args.ca_file,
            client_cert: args.cert,
            client_key: args.key,
            username: args.user,
            password: args.password,
            token: args.token,
            token_file: args.token_file,
            kube_config: args.kube_config,
            in_namespace: args.in_namespace,
        }
    }
}

/// Namespace include/exclude lists
#[derive(Args, Debug, Clone, Default)]
pub struct NamespaceArgs {
    /// Comma separated namespaces to check
    #[arg(short = 'i', long, alias = "namespaces", default_value = "")]
    pub include_namespace: String,

    /// Comma separated namespaces to ignore
    #[arg(short = 'n', long, alias = "exclude-namespaces", default_value = "")]
    pub exclude_namespace: String,
}

impl NamespaceArgs {
    fn filter(&self) -> NameFilter {
        NameFilter::from_lists(&self.include_namespace, &self.exclude_namespace)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check that all nodes are ready
    NodesReady {
        /// Comma separated nodes to ignore
        #[arg(long, default_value = "")]
        exclude_nodes: String,
    },

    /// Check that all pods are ready
    PodsRunning {
        /// Comma separated pods to check
        #[arg(short, long, default_value = "all")]
        pods: String,
        /// Label selector
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check for pods stuck pending or restarting
    PodsPending {
        #[arg(short, long, default_value = "all")]
        pods: String,
        /// Seconds a pod may stay pending
        #[arg(short, long, default_value_t = 300)]
        timeout: i64,
        /// Restarts allowed per container
        #[arg(short, long, default_value_t = 10)]
        restart: u32,
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check container restart counts
    PodsRestarting {
        #[arg(short, long, default_value = "all")]
        pods: String,
        /// Restarts allowed per container
        #[arg(short, long, default_value_t = 10)]
        restart: u32,
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check how long pods have been running
    PodsRuntime {
        #[arg(short, long, default_value = "all")]
        pods: String,
        /// Warn above this many seconds of runtime
        #[arg(short, long)]
        warn: Option<i64>,
        /// Critical above this many seconds of runtime
        #[arg(short, long)]
        critical: Option<i64>,
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check that the pods behind services are running
    ServiceAvailable {
        /// Comma separated services to check
        #[arg(short, long)]
        list: String,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check that services have backing endpoints
    ServiceEndpoints {
        /// Comma separated services to check
        #[arg(short = 'l', long, default_value = "all")]
        services: String,
        /// Comma separated services to ignore
        #[arg(long, default_value = "")]
        exclude_services: String,
        /// Comma separated service types to check
        #[arg(short, long, default_value = "ClusterIP,LoadBalancer")]
        types: String,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check cert-manager certificates for expiration
    Certs {
        /// Days before expiration to alert
        #[arg(short, long, default_value_t = 7)]
        expiration_window: i64,
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check DNS records of annotated load balancer services
    ExternalDnsServices {
        /// Comma separated services to check
        #[arg(long, default_value = "all")]
        services: String,
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check DNS records of ingress hosts
    ExternalDnsIngresses {
        /// Comma separated ingresses to check
        #[arg(long, default_value = "all")]
        ingresses: String,
        /// Comma separated domains managed by external-dns
        #[arg(long)]
        domain_filter: String,
        #[arg(short, long)]
        filter: Option<String>,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check the last run of cronjobs
    Cronjobs {
        /// Comma separated cronjobs to check
        #[arg(short, long, default_value = "all")]
        cronjobs: String,
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Check that the API server answers its health probe
    ApiserverAvailable,

    /// Delete a pod, by name or from a monitoring event on stdin
    DeletePod {
        /// Pod name, read from the event on stdin when omitted
        name: Option<String>,
        /// Namespace of the pod
        #[arg(long, default_value = "default")]
        namespace: String,
    },
}

fn names(include: &str) -> NameFilter {
    NameFilter::from_lists(include, "")
}

/// Domains with surrounding whitespace and trailing dots removed
fn domains(input: &str) -> Vec<String> {
    parse_list(input)
        .into_iter()
        .map(|d| d.trim_end_matches('.').to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

impl Command {
    /// Frozen check configuration, `None` for commands that are not
    /// resource checks
    pub fn check_config(&self) -> Option<CheckConfig> {
        let (rule, names, namespaces, selector) = match self {
            Command::NodesReady { exclude_nodes } => (
                Rule::NodeReady,
                NameFilter::from_lists("", exclude_nodes),
                NameFilter::default(),
                None,
            ),
            Command::PodsRunning {
                pods,
                filter,
                namespaces,
            } => (Rule::PodReady, names(pods), namespaces.filter(), filter.clone()),
            Command::PodsPending {
                pods,
                timeout,
                restart,
                filter,
                namespaces,
            } => (
                Rule::PodPending {
                    pending_secs: *timeout,
                    restarts: *restart,
                },
                names(pods),
                namespaces.filter(),
                filter.clone(),
            ),
            Command::PodsRestarting {
                pods,
                restart,
                filter,
                namespaces,
            } => (
                Rule::PodRestarts { restarts: *restart },
                names(pods),
                namespaces.filter(),
                filter.clone(),
            ),
            Command::PodsRuntime {
                pods,
                warn,
                critical,
                filter,
                namespaces,
            } => (
                Rule::PodRuntime {
                    warn_secs: *warn,
                    critical_secs: *critical,
                },
                names(pods),
                namespaces.filter(),
                filter.clone(),
            ),
            Command::ServiceAvailable { list, namespaces } => {
                (Rule::ServicePods, names(list), namespaces.filter(), None)
            }
            Command::ServiceEndpoints {
                services,
                exclude_services,
                types,
                namespaces,
            } => {
                let mut types: std::collections::BTreeSet<String> =
                    parse_list(&types.to_lowercase());
                if types.is_empty() {
                    types = DEFAULT_SERVICE_TYPES.iter().map(|t| t.to_string()).collect();
                }
                (
                    Rule::ServiceEndpoints { types },
                    NameFilter::from_lists(services, exclude_services),
                    namespaces.filter(),
                    None,
                )
            }
            Command::Certs {
                expiration_window,
                filter,
                namespaces,
            } => (
                Rule::CertificateExpiry {
                    window_secs: expiration_window * SECS_PER_DAY,
                },
                NameFilter::default(),
                namespaces.filter(),
                filter.clone(),
            ),
            Command::ExternalDnsServices {
                services,
                filter,
                namespaces,
            } => (
                Rule::ExternalDnsServices,
                names(services),
                namespaces.filter(),
                filter.clone(),
            ),
            Command::ExternalDnsIngresses {
                ingresses,
                domain_filter,
                filter,
                namespaces,
            } => (
                Rule::ExternalDnsIngresses {
                    domain_filter: domains(domain_filter),
                },
                names(ingresses),
                namespaces.filter(),
                filter.clone(),
            ),
            Command::Cronjobs {
                cronjobs,
                namespaces,
            } => (Rule::CronJobLastRun, names(cronjobs), namespaces.filter(), None),
            Command::ApiserverAvailable | Command::DeletePod { .. } => return None,
        };

        Some(
            CheckConfig::new(rule)
                .with_filter(ResourceFilter::new(names, namespaces))
                .with_label_selector(selector),
        )
    }

    /// Check name printed in front of the status
    pub fn check_name(&self) -> &'static str {
        match self {
            Command::ApiserverAvailable => "ApiServerAvailable",
            Command::DeletePod { .. } => "KubePod",
            other => other
                .check_config()
                .map(|config| config.rule.text().name)
                .unwrap_or("kubecheck"),
        }
    }
}
