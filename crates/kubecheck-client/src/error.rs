//! Error types for kubecheck-client

use kubecheck_core::QueryError;
use thiserror::Error;

/// Errors raised while building a connection to the API server
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Option combination makes no sense
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// In-cluster mode without the service environment
    #[error(
        "Unable to load in-cluster configuration, KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT must be defined"
    )]
    MissingServiceEnv,

    /// Failed to read a kubeconfig or credential file
    #[error("Unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a kubeconfig document
    #[error("Unable to read kubeconfig: {0}")]
    KubeconfigParse(#[from] serde_yaml::Error),

    /// Namespace file holds something that is not a namespace name
    #[error("Invalid namespace '{namespace}' found in {path}")]
    InvalidNamespace { namespace: String, path: String },

    /// kube rejected the assembled configuration
    #[error("Failed to create client config: {0}")]
    Config(String),

    /// Client construction failed
    #[error("Failed to create K8s client: {0}")]
    ClientCreate(String),
}

/// Classify a kube error for the check layer
///
/// Anything that stops us from talking to the API server, including
/// rejected credentials, is a connection problem. A request the server
/// understood and refused is an API error.
pub fn classify(error: kube::Error) -> QueryError {
    match error {
        kube::Error::Api(response) if response.code == 401 => {
            QueryError::Connection(format!("unauthorized: {}", response.message))
        }
        kube::Error::Api(response) => QueryError::Api {
            code: response.code,
            message: response.message,
        },
        kube::Error::SerdeError(e) => QueryError::Decode(e.to_string()),
        other => QueryError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "pods is forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code,
        })
    }

    #[test]
    fn test_classify_api_rejection() {
        assert_eq!(
            classify(api_error(403)),
            QueryError::Api {
                code: 403,
                message: "pods is forbidden".to_string()
            }
        );
    }

    #[test]
    fn test_classify_unauthorized_as_connection() {
        assert!(matches!(classify(api_error(401)), QueryError::Connection(_)));
    }
}
