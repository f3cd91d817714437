//! Cluster, Placement, and LabelSelector type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Label every registered cluster is expected to carry, set to its own name.
///
/// Explicit cluster-name placement is resolved through this label. The
/// registry is responsible for maintaining it; it is not enforced here.
pub const NAME_LABEL: &str = "name";

/// Object metadata shared by registry resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Unique name within the registry
    pub name: String,
    /// Namespace, if the registry is namespaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Key/value labels used for selection
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Free-form annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Registry-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// A cluster registered with the cluster registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Object metadata
    pub metadata: ObjectMeta,
    /// Desired state
    #[serde(default)]
    pub spec: ClusterSpec,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ClusterStatus>,
}

impl Cluster {
    /// Create a cluster labeled with its own name, as the registry does
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut labels = BTreeMap::new();
        labels.insert(NAME_LABEL.to_string(), name.clone());

        Self {
            metadata: ObjectMeta {
                name,
                labels,
                uid: Some(Uuid::new_v4()),
                creation_timestamp: Some(Utc::now()),
                ..Default::default()
            },
            spec: ClusterSpec::default(),
            status: None,
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Cluster name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Cluster labels
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }
}

/// Desired state of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Endpoints of the cluster's API server
    #[serde(default)]
    pub kubernetes_api_endpoints: KubernetesApiEndpoints,
}

/// API server endpoints of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesApiEndpoints {
    /// Server addresses by client CIDR
    #[serde(default)]
    pub server_endpoints: Vec<ServerAddressByClientCidr>,
    /// PEM-encoded CA bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

/// Server address reachable from a client CIDR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerAddressByClientCidr {
    #[serde(rename = "clientCIDR")]
    pub client_cidr: String,
    pub server_address: String,
}

/// Observed state of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

/// A single observed condition of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// List payload returned by the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterList {
    #[serde(default)]
    pub items: Vec<Cluster>,
}

/// Reference to a cluster by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericClusterReference {
    pub name: String,
}

/// Label selector as written in a placement document
///
/// `match_labels` and `match_expressions` are ANDed. An empty selector
/// matches every cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Selector requiring `key=value`
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    /// Selector with an additional set-based requirement
    pub fn with_expression(mut self, requirement: LabelSelectorRequirement) -> Self {
        self.match_expressions.push(requirement);
        self
    }
}

/// Set-based selector requirement
///
/// The operator is kept as written (`In`, `NotIn`, `Exists`,
/// `DoesNotExist`); it is validated when the selector is converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    /// Create a requirement
    pub fn new(key: impl Into<String>, operator: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            operator: operator.into(),
            values,
        }
    }
}

/// Placement criteria shared by placement-aware resources
///
/// When `clusters` is non-empty it takes precedence and `cluster_selector`
/// is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericPlacementFields {
    /// Explicit cluster names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<GenericClusterReference>,
    /// Label selector over cluster labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_selector: Option<LabelSelector>,
}

impl GenericPlacementFields {
    /// Placement by explicit cluster names
    pub fn for_clusters<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clusters: names
                .into_iter()
                .map(|n| GenericClusterReference { name: n.into() })
                .collect(),
            cluster_selector: None,
        }
    }

    /// Placement by label selector
    pub fn for_selector(selector: LabelSelector) -> Self {
        Self {
            clusters: Vec::new(),
            cluster_selector: Some(selector),
        }
    }
}

/// Where a workload should run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(flatten)]
    pub generic: GenericPlacementFields,
    /// Place only on the local (management) cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<bool>,
}

impl Placement {
    /// Whether the workload is placed on the local cluster only.
    /// An unset flag means remote placement.
    pub fn is_local(&self) -> bool {
        self.local.unwrap_or(false)
    }
}
