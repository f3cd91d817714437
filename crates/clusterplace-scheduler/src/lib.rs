//! clusterplace-scheduler: Placement resolution for clusterplace
//!
//! This crate provides the logic a multi-cluster scheduler uses to pick
//! target clusters:
//! - Resolving placement criteria into the matching registered clusters
//! - Local placement detection
//! - Watching for the cluster registry to become available

pub mod placement;
pub mod watchdog;

pub use placement::{
    place_by_generic_placement_fields, to_place_local, PlacementResolver, ResolvedClusterSet,
};
pub use watchdog::{detect_cluster_registry, is_registry_ready, RegistryWatchdog, WatchOutcome};
