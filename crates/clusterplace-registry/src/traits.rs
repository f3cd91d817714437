//! Registry trait definitions

use async_trait::async_trait;
use clusterplace_core::{Cluster, ClusterPlaceResult, Selector};

/// Read access to the cluster registry
#[async_trait]
pub trait ClusterRegistry: Send + Sync {
    /// List clusters whose labels satisfy `selector`.
    ///
    /// Implementations report a missing resource collection as
    /// `ClusterPlaceError::NotFound` so callers can tell it apart from
    /// other failures.
    async fn list(&self, selector: &Selector) -> ClusterPlaceResult<Vec<Cluster>>;

    /// Get the registry name
    fn name(&self) -> &'static str;
}
