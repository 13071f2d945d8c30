//! Connection configuration
//!
//! Turns command line connection options into a `kube::Config`. Explicit
//! options are assembled into an in-memory kubeconfig so that kube handles
//! TLS and credentials the same way it does for a kubeconfig file.

use crate::error::ConnectError;
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// CA bundle mounted into pods by the service account admission
pub const INCLUSTER_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Service account bearer token
pub const INCLUSTER_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Namespace of the pod running the check
pub const INCLUSTER_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Name used for the cluster, user and context of generated kubeconfigs
const CONTEXT: &str = "kubecheck";

/// How to reach and authenticate to the API server
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub api_server: Option<String>,
    /// Use service account credentials
    pub in_cluster: bool,
    pub ca_file: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub kube_config: Option<PathBuf>,
    /// Scope namespaced queries to the namespace of the running pod
    pub in_namespace: bool,
}

/// `KUBERNETES_SERVICE_HOST`/`PORT` as seen by the process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEnv {
    pub host: Option<String>,
    pub port: Option<String>,
}

impl ServiceEnv {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            port: std::env::var("KUBERNETES_SERVICE_PORT").ok(),
        }
    }

    /// API server URL of the in-cluster service
    pub fn server_url(&self) -> Result<String, ConnectError> {
        match (&self.host, &self.port) {
            (Some(host), Some(port)) if host.contains(':') => {
                Ok(format!("https://[{}]:{}", host, port))
            }
            (Some(host), Some(port)) => Ok(format!("https://{}:{}", host, port)),
            _ => Err(ConnectError::MissingServiceEnv),
        }
    }
}

impl ConnectionOptions {
    /// Reject option combinations that cannot work
    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(ConnectError::InvalidOptions(
                "SSL requires both client cert and client key".to_string(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConnectError::InvalidOptions(
                "a password requires a user".to_string(),
            ));
        }
        if self.token.is_some() && self.token_file.is_some() {
            return Err(ConnectError::InvalidOptions(
                "use either a token or a token file, not both".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether any option beyond the kubeconfig path was given
    fn has_explicit_connection(&self) -> bool {
        self.api_server.is_some()
            || self.in_cluster
            || self.ca_file.is_some()
            || self.client_cert.is_some()
            || self.username.is_some()
            || self.token.is_some()
            || self.token_file.is_some()
    }

    /// Kubeconfig describing the requested connection
    ///
    /// `None` means nothing was configured and kube should infer the
    /// connection from the environment.
    pub fn kubeconfig(&self, env: &ServiceEnv) -> Result<Option<Kubeconfig>, ConnectError> {
        self.validate()?;

        if let Some(path) = &self.kube_config {
            let path = expand_home(path);
            if self.has_explicit_connection() {
                tracing::warn!("--kube-config given, ignoring other connection options");
            }
            return read_kubeconfig(&path).map(Some);
        }

        if !self.has_explicit_connection() {
            return Ok(None);
        }

        let server = match (&self.api_server, self.in_cluster) {
            (Some(server), _) => server.clone(),
            (None, true) => env.server_url()?,
            (None, false) => {
                return Err(ConnectError::InvalidOptions(
                    "an API server is required unless --in-cluster or --kube-config is used"
                        .to_string(),
                ));
            }
        };

        let ca_file = self.ca_file.clone().or_else(|| {
            let default = PathBuf::from(INCLUSTER_CA_FILE);
            (self.in_cluster && default.exists()).then_some(default)
        });
        let token_file = self.token_file.clone().or_else(|| {
            (self.in_cluster && self.token.is_none()).then(|| PathBuf::from(INCLUSTER_TOKEN_FILE))
        });

        let mut cluster = Mapping::new();
        cluster.insert("server".into(), server.into());
        match &ca_file {
            Some(path) => {
                cluster.insert("certificate-authority".into(), path_value(path));
            }
            // No CA to verify against: trust whatever the server presents
            None => {
                cluster.insert("insecure-skip-tls-verify".into(), true.into());
            }
        }

        let mut user = Mapping::new();
        if let Some(username) = &self.username {
            user.insert("username".into(), username.clone().into());
        }
        if let Some(password) = &self.password {
            user.insert("password".into(), password.clone().into());
        }
        if let Some(token) = &self.token {
            user.insert("token".into(), token.clone().into());
        }
        if let Some(path) = &token_file {
            user.insert("tokenFile".into(), path_value(path));
        }
        if let Some(path) = &self.client_cert {
            user.insert("client-certificate".into(), path_value(path));
        }
        if let Some(path) = &self.client_key {
            user.insert("client-key".into(), path_value(path));
        }

        let mut context = Mapping::new();
        context.insert("cluster".into(), CONTEXT.into());
        context.insert("user".into(), CONTEXT.into());

        let mut doc = Mapping::new();
        doc.insert("apiVersion".into(), "v1".into());
        doc.insert("kind".into(), "Config".into());
        doc.insert("clusters".into(), named("cluster", cluster));
        doc.insert("users".into(), named("user", user));
        doc.insert("contexts".into(), named("context", context));
        doc.insert("current-context".into(), CONTEXT.into());

        let kubeconfig: Kubeconfig = serde_yaml::from_value(Value::Mapping(doc))?;
        Ok(Some(kubeconfig))
    }

    /// Build the client configuration
    pub async fn config(&self) -> Result<kube::Config, ConnectError> {
        match self.kubeconfig(&ServiceEnv::from_env())? {
            Some(kubeconfig) => {
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| ConnectError::Config(e.to_string()))
            }
            None => kube::Config::infer()
                .await
                .map_err(|e| ConnectError::Config(e.to_string())),
        }
    }

    /// Namespace to scope queries to, if `--in-namespace` was given
    pub fn namespace(&self) -> Result<Option<String>, ConnectError> {
        if !self.in_namespace {
            return Ok(None);
        }
        read_namespace(Path::new(INCLUSTER_NAMESPACE_FILE)).map(Some)
    }
}

/// `[{name: kubecheck, <key>: value}]`
fn named(key: &str, value: Mapping) -> Value {
    let mut entry = Mapping::new();
    entry.insert("name".into(), CONTEXT.into());
    entry.insert(key.into(), Value::Mapping(value));
    Value::Sequence(vec![Value::Mapping(entry)])
}

fn path_value(path: &Path) -> Value {
    path.to_string_lossy().into_owned().into()
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs_next::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Read and parse a kubeconfig file
pub fn read_kubeconfig(path: &Path) -> Result<Kubeconfig, ConnectError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConnectError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let kubeconfig: Kubeconfig = serde_yaml::from_str(&yaml)?;
    Ok(kubeconfig)
}

/// Read a namespace name from a file, as mounted by the service account
pub fn read_namespace(path: &Path) -> Result<String, ConnectError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConnectError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let namespace = raw.trim().to_string();
    if !valid_namespace(&namespace) {
        return Err(ConnectError::InvalidNamespace {
            namespace,
            path: path.display().to_string(),
        });
    }
    Ok(namespace)
}

/// 1-63 lowercase alphanumerics or hyphens, starting and ending with an
/// alphanumeric
pub fn valid_namespace(namespace: &str) -> bool {
    let bytes = namespace.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    edge_ok(&bytes[0])
        && edge_ok(&bytes[bytes.len() - 1])
        && bytes.iter().all(|b| edge_ok(b) || *b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cluster_of(kubeconfig: &Kubeconfig) -> kube::config::Cluster {
        kubeconfig.clusters[0].cluster.clone().unwrap()
    }

    fn user_of(kubeconfig: &Kubeconfig) -> kube::config::AuthInfo {
        kubeconfig.auth_infos[0].auth_info.clone().unwrap()
    }

    #[test]
    fn test_nothing_configured_infers() {
        let options = ConnectionOptions::default();
        assert!(options.kubeconfig(&ServiceEnv::default()).unwrap().is_none());
    }

    #[test]
    fn test_cert_requires_key() {
        let options = ConnectionOptions {
            api_server: Some("https://k8s:6443".to_string()),
            client_cert: Some(PathBuf::from("/tmp/cert.pem")),
            ..Default::default()
        };
        assert!(matches!(
            options.kubeconfig(&ServiceEnv::default()),
            Err(ConnectError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_explicit_server_without_ca_skips_verification() {
        let options = ConnectionOptions {
            api_server: Some("https://k8s:6443".to_string()),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let kubeconfig = options.kubeconfig(&ServiceEnv::default()).unwrap().unwrap();
        let cluster = cluster_of(&kubeconfig);
        assert_eq!(cluster.server.as_deref(), Some("https://k8s:6443"));
        assert_eq!(cluster.insecure_skip_tls_verify, Some(true));
        assert_eq!(user_of(&kubeconfig).username.as_deref(), Some("admin"));
        assert_eq!(kubeconfig.current_context.as_deref(), Some(CONTEXT));
    }

    #[test]
    fn test_in_cluster_defaults() {
        let options = ConnectionOptions {
            in_cluster: true,
            ..Default::default()
        };
        let env = ServiceEnv {
            host: Some("10.96.0.1".to_string()),
            port: Some("443".to_string()),
        };
        let kubeconfig = options.kubeconfig(&env).unwrap().unwrap();
        assert_eq!(
            cluster_of(&kubeconfig).server.as_deref(),
            Some("https://10.96.0.1:443")
        );
        assert_eq!(
            user_of(&kubeconfig).token_file.as_deref(),
            Some(INCLUSTER_TOKEN_FILE)
        );
    }

    #[test]
    fn test_in_cluster_requires_service_env() {
        let options = ConnectionOptions {
            in_cluster: true,
            ..Default::default()
        };
        let env = ServiceEnv {
            host: Some("10.96.0.1".to_string()),
            port: None,
        };
        assert!(matches!(
            options.kubeconfig(&env),
            Err(ConnectError::MissingServiceEnv)
        ));
    }

    #[test]
    fn test_ipv6_service_host() {
        let env = ServiceEnv {
            host: Some("fd00::1".to_string()),
            port: Some("443".to_string()),
        };
        assert_eq!(env.server_url().unwrap(), "https://[fd00::1]:443");
    }

    #[test]
    fn test_read_kubeconfig_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
apiVersion: v1
kind: Config
clusters:
- name: prod
  cluster:
    server: https://prod.example.com:6443
users:
- name: ops
  user:
    token: abc
contexts:
- name: prod
  context:
    cluster: prod
    user: ops
current-context: prod
"#
        )
        .unwrap();

        let options = ConnectionOptions {
            kube_config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let kubeconfig = options.kubeconfig(&ServiceEnv::default()).unwrap().unwrap();
        assert_eq!(
            cluster_of(&kubeconfig).server.as_deref(),
            Some("https://prod.example.com:6443")
        );
    }

    #[test]
    fn test_missing_kubeconfig_file() {
        let options = ConnectionOptions {
            kube_config: Some(PathBuf::from("/nonexistent/kubeconfig")),
            ..Default::default()
        };
        assert!(matches!(
            options.kubeconfig(&ServiceEnv::default()),
            Err(ConnectError::Read { .. })
        ));
    }

    #[test]
    fn test_read_namespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "monitoring").unwrap();
        assert_eq!(read_namespace(file.path()).unwrap(), "monitoring");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "-Bad_Name").unwrap();
        assert!(matches!(
            read_namespace(bad.path()),
            Err(ConnectError::InvalidNamespace { .. })
        ));
    }

    #[test]
    fn test_valid_namespace() {
        assert!(valid_namespace("kube-system"));
        assert!(valid_namespace("a"));
        assert!(!valid_namespace(""));
        assert!(!valid_namespace("-lead"));
        assert!(!valid_namespace("trail-"));
        assert!(!valid_namespace("Upper"));
        assert!(!valid_namespace(&"a".repeat(64)));
    }

    #[test]
    fn test_expand_home() {
        let plain = PathBuf::from("/etc/kubeconfig");
        assert_eq!(expand_home(&plain), plain);

        if let Some(home) = dirs_next::home_dir() {
            assert_eq!(expand_home(Path::new("~/.kube/config")), home.join(".kube/config"));
        }
    }
}
