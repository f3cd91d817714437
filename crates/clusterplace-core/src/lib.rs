//! clusterplace-core: Core types for cluster placement
//!
//! This crate provides the fundamental types used throughout clusterplace:
//! - Cluster and placement specifications
//! - Label selector conversion and matching
//! - Configuration types
//! - Error handling
//! - Deep copy helpers

pub mod config;
pub mod copy;
pub mod error;
pub mod model;
pub mod selector;

pub use config::*;
pub use copy::*;
pub use error::*;
pub use model::*;
pub use selector::*;
