//! kubecheck-client: Kubernetes access for kubecheck
//!
//! Implements the cluster query and resolver ports on top of `kube`.

pub mod client;
pub mod connect;
pub mod convert;
pub mod error;
pub mod resolver;

pub use client::KubeClient;
pub use connect::{ConnectionOptions, ServiceEnv};
pub use error::{ConnectError, classify};
pub use resolver::SystemResolver;
