//! Workload objects for cluster-hosted servers and the client seam that applies them.
//!
//! A managed server is materialized as five objects in one namespace, all named from the
//! server name (see [`WorkloadNames`]). The objects themselves are built in [`manifests`];
//! applying and deleting them goes through a [`ClusterClient`], with the Kubernetes
//! implementation in [`kubernetes`].

pub mod kubernetes;
pub mod manifests;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Secret, Service};

use crate::errors::Error;
use crate::types::Resource;

/// The five object kinds that make up a server workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Secret,
    ConfigMap,
    PersistentVolumeClaim,
    Deployment,
    Service,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Secret => "Secret",
            WorkloadKind::ConfigMap => "ConfigMap",
            WorkloadKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::Service => "Service",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed workload object ready to be applied
#[derive(Debug, Clone)]
pub enum WorkloadObject {
    Secret(Secret),
    ConfigMap(ConfigMap),
    PersistentVolumeClaim(PersistentVolumeClaim),
    Deployment(Deployment),
    Service(Service),
}

impl WorkloadObject {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            WorkloadObject::Secret(_) => WorkloadKind::Secret,
            WorkloadObject::ConfigMap(_) => WorkloadKind::ConfigMap,
            WorkloadObject::PersistentVolumeClaim(_) => WorkloadKind::PersistentVolumeClaim,
            WorkloadObject::Deployment(_) => WorkloadKind::Deployment,
            WorkloadObject::Service(_) => WorkloadKind::Service,
        }
    }

    pub fn name(&self) -> &str {
        let name = match self {
            WorkloadObject::Secret(o) => o.metadata.name.as_deref(),
            WorkloadObject::ConfigMap(o) => o.metadata.name.as_deref(),
            WorkloadObject::PersistentVolumeClaim(o) => o.metadata.name.as_deref(),
            WorkloadObject::Deployment(o) => o.metadata.name.as_deref(),
            WorkloadObject::Service(o) => o.metadata.name.as_deref(),
        };
        name.unwrap_or_default()
    }

    /// JSON form of the object, as submitted to the cluster API
    #[cfg(test)]
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            WorkloadObject::Secret(o) => serde_json::to_value(o),
            WorkloadObject::ConfigMap(o) => serde_json::to_value(o),
            WorkloadObject::PersistentVolumeClaim(o) => serde_json::to_value(o),
            WorkloadObject::Deployment(o) => serde_json::to_value(o),
            WorkloadObject::Service(o) => serde_json::to_value(o),
        }
    }
}

/// Deterministic object names for a server workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadNames {
    pub deployment: String,
    pub service: String,
    pub config_map: String,
    pub secret: String,
    pub volume_claim: String,
}

impl WorkloadNames {
    pub fn for_server(name: &str) -> Self {
        Self {
            deployment: name.to_string(),
            service: name.to_string(),
            config_map: format!("{name}-config"),
            secret: format!("{name}-secrets"),
            volume_claim: format!("{name}-pv-claim"),
        }
    }

    /// Every object as `(kind, name)`, in apply order
    pub fn objects(&self) -> [(WorkloadKind, &str); 5] {
        [
            (WorkloadKind::Secret, self.secret.as_str()),
            (WorkloadKind::ConfigMap, self.config_map.as_str()),
            (WorkloadKind::PersistentVolumeClaim, self.volume_claim.as_str()),
            (WorkloadKind::Deployment, self.deployment.as_str()),
            (WorkloadKind::Service, self.service.as_str()),
        ]
    }
}

/// What the cluster reports about a server's deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub uid: Option<String>,
    /// At least one replica reports ready
    pub ready: bool,
}

/// Applies and retracts workload objects in one cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, namespace: &str) -> anyhow::Result<()>;

    /// Create or update an object.
    async fn apply(&self, namespace: &str, object: &WorkloadObject) -> anyhow::Result<()>;

    /// Delete an object. Returns false when it was already gone.
    async fn delete(&self, namespace: &str, kind: WorkloadKind, name: &str) -> anyhow::Result<bool>;

    /// Status of the named deployment, `None` when it does not exist.
    async fn workload_status(&self, namespace: &str, name: &str) -> anyhow::Result<Option<WorkloadStatus>>;
}

/// A configured cluster and its client
#[derive(Clone)]
pub struct Cluster {
    pub id: String,
    /// DNS suffix, as in `<name>.<namespace>.svc.<domain>`
    pub domain: String,
    pub client: Arc<dyn ClusterClient>,
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster").field("id", &self.id).field("domain", &self.domain).finish()
    }
}

/// All configured clusters, by id
#[derive(Debug, Clone, Default)]
pub struct Clusters {
    clusters: HashMap<String, Cluster>,
}

impl Clusters {
    pub fn new(clusters: impl IntoIterator<Item = Cluster>) -> Self {
        Self {
            clusters: clusters.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Result<&Cluster, Error> {
        self.clusters.get(id).ok_or_else(|| Error::not_found(Resource::Cluster, id))
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_names_are_derived_from_server_name() {
        let names = WorkloadNames::for_server("sure-vervet");
        assert_eq!(names.deployment, "sure-vervet");
        assert_eq!(names.service, "sure-vervet");
        assert_eq!(names.config_map, "sure-vervet-config");
        assert_eq!(names.secret, "sure-vervet-secrets");
        assert_eq!(names.volume_claim, "sure-vervet-pv-claim");
    }

    #[test]
    fn test_unknown_cluster_is_not_found() {
        let clusters = Clusters::default();
        let err = clusters.get("cloud1").unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::Cluster, .. }));
    }
}
