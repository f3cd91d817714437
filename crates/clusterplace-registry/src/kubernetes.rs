//! Kubernetes API client for the cluster registry

use async_trait::async_trait;
use clusterplace_core::{
    instance_deep_copy, Cluster, ClusterPlaceError, ClusterPlaceResult, RegistryConfig, Selector,
};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use tracing::{debug, warn};

use crate::traits::ClusterRegistry;

/// API group of the cluster registry
pub const CLUSTER_GROUP: &str = "clusterregistry.k8s.io";
/// Served version of the cluster registry API
pub const CLUSTER_VERSION: &str = "v1alpha1";
pub const CLUSTER_KIND: &str = "Cluster";
pub const CLUSTER_PLURAL: &str = "clusters";

/// API resource describing registry `Cluster` objects
pub fn cluster_api_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(CLUSTER_GROUP, CLUSTER_VERSION, CLUSTER_KIND);
    ApiResource::from_gvk_with_plural(&gvk, CLUSTER_PLURAL)
}

/// Cluster registry served by a Kubernetes API server
pub struct KubeRegistry {
    api: Api<DynamicObject>,
}

impl KubeRegistry {
    /// Create a registry over an existing client, optionally scoped to one namespace
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        let ar = cluster_api_resource();
        let api = match namespace {
            Some(ns) => Api::namespaced_with(client, ns, &ar),
            None => Api::all_with(client, &ar),
        };
        Self { api }
    }

    /// Create a registry from configuration.
    ///
    /// An explicit `cluster_url` wins; otherwise the named kubeconfig context
    /// is used, and without one the config is inferred from the environment.
    pub async fn from_config(config: &RegistryConfig) -> ClusterPlaceResult<Self> {
        let mut kube_config = match (&config.cluster_url, &config.context) {
            (Some(url), _) => Config::new(url.parse().map_err(|e| {
                ClusterPlaceError::Config(format!("Invalid cluster URL '{}': {}", url, e))
            })?),
            (None, Some(context)) => Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                ClusterPlaceError::Config(format!(
                    "Failed to load kubeconfig for context '{}': {}",
                    context, e
                ))
            })?,
            (None, None) => Config::infer().await.map_err(|e| {
                ClusterPlaceError::Config(format!("Failed to infer Kubernetes config: {}", e))
            })?,
        };

        kube_config.connect_timeout = Some(config.timeout());
        kube_config.read_timeout = Some(config.timeout());

        let client = Client::try_from(kube_config).map_err(|e| {
            ClusterPlaceError::Network(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self::new(client, config.namespace.as_deref()))
    }
}

/// Convert a listed object into a `Cluster`
pub(crate) fn to_cluster(object: &DynamicObject) -> ClusterPlaceResult<Cluster> {
    instance_deep_copy(object)
}

/// Map a list failure onto the registry error taxonomy.
///
/// A 404 means the registry API is not installed.
fn map_list_error(err: kube::Error) -> ClusterPlaceError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterPlaceError::NotFound(format!(
            "{}/{} {}: {}",
            CLUSTER_GROUP, CLUSTER_VERSION, CLUSTER_PLURAL, response.message
        )),
        kube::Error::Api(response) => ClusterPlaceError::Registry(format!(
            "listing {} returned {}: {}",
            CLUSTER_PLURAL, response.code, response.message
        )),
        kube::Error::SerdeError(e) => ClusterPlaceError::Serialization(e.to_string()),
        other => ClusterPlaceError::Network(other.to_string()),
    }
}

#[async_trait]
impl ClusterRegistry for KubeRegistry {
    async fn list(&self, selector: &Selector) -> ClusterPlaceResult<Vec<Cluster>> {
        let mut params = ListParams::default();
        if !selector.is_everything() {
            params = params.labels(&selector.to_string());
        }

        let objects = self.api.list(&params).await.map_err(|e| {
            let err = map_list_error(e);
            if !err.is_not_found() {
                warn!(selector = %selector, error = %err, "Cluster registry request failed");
            }
            err
        })?;

        let clusters = objects
            .items
            .iter()
            .map(to_cluster)
            .collect::<ClusterPlaceResult<Vec<_>>>()?;

        debug!(selector = %selector, count = clusters.len(), "Listed clusters");

        Ok(clusters)
    }

    fn name(&self) -> &'static str {
        "kubernetes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterplace_core::{label_selector_as_selector, LabelSelector};
    use std::collections::BTreeMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    const CLUSTERS_PATH: &str = "/apis/clusterregistry.k8s.io/v1alpha1/clusters";

    const NOT_FOUND_STATUS: &str = r#"{"kind":"Status","apiVersion":"v1","metadata":{},"status":"Failure","message":"the server could not find the requested resource","reason":"NotFound","details":{},"code":404}"#;

    /// Serve one canned HTTP response and report the request line
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let request_line = request.lines().next().unwrap_or_default().to_string();

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(request_line);
        });

        (format!("http://{}", addr), rx)
    }

    async fn registry_at(url: &str) -> KubeRegistry {
        let config = RegistryConfig {
            cluster_url: Some(url.to_string()),
            timeout_secs: 2,
            ..Default::default()
        };
        KubeRegistry::from_config(&config).await.unwrap()
    }

    #[test]
    fn test_cluster_api_resource() {
        let ar = cluster_api_resource();
        assert_eq!(ar.group, CLUSTER_GROUP);
        assert_eq!(ar.api_version, "clusterregistry.k8s.io/v1alpha1");
        assert_eq!(ar.kind, "Cluster");
        assert_eq!(ar.plural, "clusters");
    }

    #[test]
    fn test_to_cluster() {
        let mut object = DynamicObject::new("c1", &cluster_api_resource()).data(serde_json::json!({
            "spec": {
                "kubernetesApiEndpoints": {
                    "serverEndpoints": [{"clientCIDR": "0.0.0.0/0", "serverAddress": "https://c1:6443"}]
                }
            }
        }));
        object.metadata.labels = Some(BTreeMap::from([
            ("name".to_string(), "c1".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]));

        let cluster = to_cluster(&object).unwrap();
        assert_eq!(cluster.name(), "c1");
        assert_eq!(cluster.labels().get("env").map(String::as_str), Some("prod"));
        assert_eq!(
            cluster.spec.kubernetes_api_endpoints.server_endpoints[0].server_address,
            "https://c1:6443"
        );
    }

    #[tokio::test]
    async fn test_invalid_cluster_url() {
        let config = RegistryConfig {
            cluster_url: Some("not a url".to_string()),
            ..Default::default()
        };
        let result = KubeRegistry::from_config(&config).await;
        assert!(matches!(result, Err(ClusterPlaceError::Config(_))));
    }

    #[tokio::test]
    async fn test_list_parses_items_and_sends_selector() {
        let body = r#"{"apiVersion":"clusterregistry.k8s.io/v1alpha1","kind":"ClusterList","metadata":{"resourceVersion":"7"},"items":[{"apiVersion":"clusterregistry.k8s.io/v1alpha1","kind":"Cluster","metadata":{"name":"c1","labels":{"name":"c1","env":"prod"}},"spec":{}}]}"#;
        let (url, request_line) = serve_once("HTTP/1.1 200 OK", body).await;
        let registry = registry_at(&url).await;

        let ls = LabelSelector::default().with_label("env", "prod");
        let selector = label_selector_as_selector(Some(&ls)).unwrap();
        let clusters = registry.list(&selector).await.unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name(), "c1");

        let request_line = request_line.await.unwrap();
        assert!(request_line.starts_with(&format!("GET {}?", CLUSTERS_PATH)));
        assert!(request_line.contains("labelSelector=env%3Dprod"));
    }

    #[tokio::test]
    async fn test_list_everything_sends_no_selector() {
        let body = r#"{"apiVersion":"clusterregistry.k8s.io/v1alpha1","kind":"ClusterList","metadata":{},"items":[]}"#;
        let (url, request_line) = serve_once("HTTP/1.1 200 OK", body).await;
        let registry = registry_at(&url).await;

        let clusters = registry.list(&Selector::everything()).await.unwrap();
        assert!(clusters.is_empty());

        let request_line = request_line.await.unwrap();
        assert!(!request_line.contains("labelSelector"));
    }

    #[tokio::test]
    async fn test_list_not_found() {
        let (url, _) = serve_once("HTTP/1.1 404 Not Found", NOT_FOUND_STATUS).await;
        let registry = registry_at(&url).await;

        let err = registry.list(&Selector::everything()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_server_error() {
        let (url, _) = serve_once("HTTP/1.1 503 Service Unavailable", "").await;
        let registry = registry_at(&url).await;

        let err = registry.list(&Selector::everything()).await.unwrap_err();
        assert!(matches!(err, ClusterPlaceError::Registry(_)));
    }

    #[tokio::test]
    async fn test_list_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = registry_at(&format!("http://{}", addr)).await;
        let err = registry.list(&Selector::everything()).await.unwrap_err();
        assert!(matches!(err, ClusterPlaceError::Network(_)));
    }
}
