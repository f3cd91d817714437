//! Resolving placement criteria into target clusters

use clusterplace_core::{
    label_selector_as_selector, Cluster, ClusterPlaceResult, GenericPlacementFields,
    LabelSelector, LabelSelectorRequirement, Placement, NAME_LABEL,
};
use clusterplace_registry::ClusterRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Matched clusters keyed by cluster name
pub type ResolvedClusterSet = HashMap<String, Cluster>;

/// Whether a placement targets only the local cluster.
///
/// A missing placement or an unset flag means remote placement.
pub fn to_place_local(placement: Option<&Placement>) -> bool {
    placement.is_some_and(Placement::is_local)
}

/// Resolve placement criteria against the registry.
///
/// Explicit cluster names take priority and the label selector is then
/// ignored; otherwise the label selector is used as is, and a missing
/// selector matches every cluster. Name lookups rely on every registered
/// cluster carrying a `name` label equal to its own name.
///
/// A registry not-found yields an empty set. The returned clusters are
/// owned copies, detached from registry state.
pub async fn place_by_generic_placement_fields(
    registry: &dyn ClusterRegistry,
    placement: &GenericPlacementFields,
) -> ClusterPlaceResult<ResolvedClusterSet> {
    let requested: Option<HashSet<&str>> = if placement.clusters.is_empty() {
        None
    } else {
        Some(placement.clusters.iter().map(|c| c.name.as_str()).collect())
    };

    let label_selector = match &requested {
        Some(_) => Some(cluster_names_selector(placement)),
        None => placement.cluster_selector.clone(),
    };

    let selector = label_selector_as_selector(label_selector.as_ref())?;

    debug!(
        registry = registry.name(),
        selector = %selector,
        "Using cluster label selector"
    );

    let clusters = match registry.list(&selector).await {
        Ok(clusters) => clusters,
        Err(e) if e.is_not_found() => {
            debug!(error = %e, "No clusters found");
            Vec::new()
        }
        Err(e) => {
            error!(error = %e, "Listing clusters failed");
            return Err(e);
        }
    };

    let mut resolved = ResolvedClusterSet::with_capacity(clusters.len());
    for cluster in clusters {
        if let Some(names) = &requested {
            if !names.contains(cluster.name()) {
                warn!(
                    cluster = %cluster.name(),
                    label = ?cluster.labels().get(NAME_LABEL),
                    "Cluster name label does not match its name, skipping"
                );
                continue;
            }
        }
        resolved.insert(cluster.metadata.name.clone(), cluster);
    }

    debug!(
        clusters = ?resolved.keys().collect::<Vec<_>>(),
        "Resolved placement"
    );

    Ok(resolved)
}

/// `name in (n1, n2, ...)` over the explicit cluster names
fn cluster_names_selector(placement: &GenericPlacementFields) -> LabelSelector {
    let values = placement.clusters.iter().map(|c| c.name.clone()).collect();
    LabelSelector::default().with_expression(LabelSelectorRequirement::new(
        NAME_LABEL,
        "In",
        values,
    ))
}

/// Resolves placements against a fixed registry
pub struct PlacementResolver {
    registry: Arc<dyn ClusterRegistry>,
}

impl PlacementResolver {
    /// Create a resolver over `registry`
    pub fn new(registry: Arc<dyn ClusterRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve generic placement criteria
    pub async fn resolve(
        &self,
        placement: &GenericPlacementFields,
    ) -> ClusterPlaceResult<ResolvedClusterSet> {
        place_by_generic_placement_fields(self.registry.as_ref(), placement).await
    }

    /// Resolve a placement, yielding no remote clusters for local placement
    pub async fn resolve_placement(
        &self,
        placement: &Placement,
    ) -> ClusterPlaceResult<ResolvedClusterSet> {
        if to_place_local(Some(placement)) {
            debug!("Local placement, no remote clusters resolved");
            return Ok(ResolvedClusterSet::new());
        }
        self.resolve(&placement.generic).await
    }
}
