//! In-memory cluster registry

use async_trait::async_trait;
use clusterplace_core::{Cluster, ClusterPlaceError, ClusterPlaceResult, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::traits::ClusterRegistry;

type ClustersMap = HashMap<String, Cluster>;

/// Cluster registry held in process memory
pub struct InMemoryRegistry {
    /// Clusters indexed by name
    clusters: Arc<RwLock<ClustersMap>>,
    /// Whether the registry API is being served
    available: AtomicBool,
}

impl InMemoryRegistry {
    /// Create an empty, available registry
    pub fn new() -> Self {
        Self {
            clusters: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }

    /// Create an available registry holding `clusters`
    pub fn with_clusters(clusters: impl IntoIterator<Item = Cluster>) -> Self {
        let map = clusters
            .into_iter()
            .map(|c| (c.metadata.name.clone(), c))
            .collect();

        Self {
            clusters: Arc::new(RwLock::new(map)),
            available: AtomicBool::new(true),
        }
    }

    /// Register or replace a cluster
    pub async fn register(&self, cluster: Cluster) {
        let name = cluster.metadata.name.clone();
        self.clusters.write().await.insert(name.clone(), cluster);

        debug!(cluster = %name, "Registered cluster");
    }

    /// Remove a cluster
    pub async fn unregister(&self, name: &str) -> Option<Cluster> {
        let removed = self.clusters.write().await.remove(name);

        debug!(cluster = %name, removed = removed.is_some(), "Unregistered cluster");

        removed
    }

    /// Get a cluster by name
    pub async fn get(&self, name: &str) -> Option<Cluster> {
        self.clusters.read().await.get(name).cloned()
    }

    /// Number of registered clusters
    pub async fn len(&self) -> usize {
        self.clusters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clusters.read().await.is_empty()
    }

    /// Mark the registry API as served or not. While unavailable every
    /// list fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterRegistry for InMemoryRegistry {
    async fn list(&self, selector: &Selector) -> ClusterPlaceResult<Vec<Cluster>> {
        if !self.is_available() {
            return Err(ClusterPlaceError::Registry(
                "cluster registry API is not served".to_string(),
            ));
        }

        let clusters = self.clusters.read().await;
        let mut matched: Vec<Cluster> = clusters
            .values()
            .filter(|c| selector.matches(c.labels()))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

        Ok(matched)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
