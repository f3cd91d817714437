//! clusterplace-registry: Cluster registry clients
//!
//! This crate provides read access to the cluster registry:
//! - The `ClusterRegistry` trait consumed by placement resolution
//! - An in-memory registry
//! - A Kubernetes API client for the cluster registry

pub mod kubernetes;
pub mod memory;
pub mod traits;

pub use kubernetes::KubeRegistry;
pub use memory::InMemoryRegistry;
pub use traits::ClusterRegistry;
