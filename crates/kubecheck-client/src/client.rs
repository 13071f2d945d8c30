//! Kubernetes API client

use crate::connect::ConnectionOptions;
use crate::convert;
use crate::error::{ConnectError, classify};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Endpoints, Node, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;
use kubecheck_core::{ClusterQuery, EndpointsSnapshot, ListScope, QueryError, Resource, ResourceKind};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Path of the API server health probe
pub const HEALTHZ_PATH: &str = "/healthz";

/// Cluster access over the Kubernetes API
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from command line connection options
    pub async fn connect(options: &ConnectionOptions) -> Result<Self, ConnectError> {
        let config = options.config().await?;
        tracing::debug!("Connecting to {}", config.cluster_url);
        let client =
            Client::try_from(config).map_err(|e| ConnectError::ClientCreate(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Api handle for a namespaced kind, cluster wide when `namespace` is `None`
    fn api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list_namespaced<K>(&self, scope: &ListScope) -> Result<Vec<K>, QueryError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(scope.namespace.as_deref());
        let list = api
            .list(&list_params(scope))
            .await
            .map_err(classify)?;
        Ok(list.items)
    }

    async fn list_nodes(&self, scope: &ListScope) -> Result<Vec<Resource>, QueryError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api.list(&list_params(scope)).await.map_err(classify)?;
        Ok(list.items.iter().map(convert::node).collect())
    }

    async fn list_certificates(&self, scope: &ListScope) -> Result<Vec<Resource>, QueryError> {
        let secrets: Vec<Secret> = self.list_namespaced(scope).await?;
        Ok(secrets
            .iter()
            .filter(|s| convert::is_cert_manager_secret(s))
            .map(convert::certificate)
            .collect())
    }

    async fn list_cronjobs(&self, scope: &ListScope) -> Result<Vec<Resource>, QueryError> {
        let cronjobs: Vec<CronJob> = self.list_namespaced(scope).await?;
        if cronjobs.is_empty() {
            return Ok(Vec::new());
        }
        // Jobs carry no labels from the cronjob selector, list them unfiltered
        let job_scope = ListScope::new(scope.namespace.clone(), None);
        let jobs: Vec<Job> = self.list_namespaced(&job_scope).await?;
        Ok(cronjobs
            .iter()
            .map(|cronjob| convert::cronjob(cronjob, &jobs))
            .collect())
    }

    /// Probe the API server health endpoint
    ///
    /// Returns the response body on success.
    pub async fn healthz(&self) -> Result<String, QueryError> {
        let request = http::Request::get(HEALTHZ_PATH)
            .body(Vec::new())
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        self.client.request_text(request).await.map_err(classify)
    }

    /// Delete a pod by name
    pub async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), QueryError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.delete(name, &DeleteParams::default())
            .await
            .map_err(classify)?;
        tracing::info!("Deleted pod {}/{}", namespace, name);
        Ok(())
    }
}

fn list_params(scope: &ListScope) -> ListParams {
    match &scope.label_selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

impl ClusterQuery for KubeClient {
    async fn list(&self, kind: ResourceKind, scope: &ListScope) -> Result<Vec<Resource>, QueryError> {
        tracing::debug!(
            "Listing {} (namespace: {}, selector: {})",
            kind.plural(),
            scope.namespace.as_deref().unwrap_or("*"),
            scope.label_selector.as_deref().unwrap_or("-")
        );
        match kind {
            ResourceKind::Node => self.list_nodes(scope).await,
            ResourceKind::Pod => {
                let pods: Vec<Pod> = self.list_namespaced(scope).await?;
                Ok(pods.iter().map(convert::pod).collect())
            }
            ResourceKind::Service => {
                let services: Vec<Service> = self.list_namespaced(scope).await?;
                Ok(services.iter().map(convert::service).collect())
            }
            ResourceKind::Ingress => {
                let ingresses: Vec<Ingress> = self.list_namespaced(scope).await?;
                Ok(ingresses.iter().map(convert::ingress).collect())
            }
            ResourceKind::Certificate => self.list_certificates(scope).await,
            ResourceKind::CronJob => self.list_cronjobs(scope).await,
        }
    }

    async fn endpoints(&self, name: &str, namespace: &str) -> Result<Option<EndpointsSnapshot>, QueryError> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        let endpoints = api.get_opt(name).await.map_err(classify)?;
        Ok(endpoints.as_ref().map(convert::endpoints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_selector() {
        let scope = ListScope::new(Some("shop".to_string()), Some("app=web".to_string()));
        assert_eq!(list_params(&scope).label_selector.as_deref(), Some("app=web"));

        let scope = ListScope::default();
        assert!(list_params(&scope).label_selector.is_none());
    }
}
