//! [`ClusterClient`] for Kubernetes, using server-side apply.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PersistentVolumeClaim, Secret, Service};
use kube::api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams};
use kube::config::KubeConfigOptions;
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::{Cluster, ClusterClient, Clusters, WorkloadKind, WorkloadObject, WorkloadStatus};
use crate::config::ClusterConfig;

const FIELD_MANAGER: &str = "mysqlctl";

pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the named kubeconfig context, or the ambient configuration
    /// (in-cluster service account or default context) when none is given.
    pub async fn connect(context: Option<&str>) -> anyhow::Result<Self> {
        let client = match context {
            Some(context) => {
                let options = KubeConfigOptions {
                    context: Some(context.to_string()),
                    ..Default::default()
                };
                let config = kube::Config::from_kubeconfig(&options)
                    .await
                    .with_context(|| format!("loading kubeconfig context '{context}'"))?;
                Client::try_from(config)?
            }
            None => Client::try_default().await.context("loading ambient kube config")?,
        };
        Ok(Self::new(client))
    }

    async fn apply_object<K>(&self, namespace: &str, object: &K) -> anyhow::Result<()>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + std::fmt::Debug + Serialize + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let name = object.meta().name.clone().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(object))
            .await?;
        Ok(())
    }

    async fn delete_object<K>(&self, namespace: &str, name: &str) -> anyhow::Result<bool>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + std::fmt::Debug + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    #[instrument(skip(self), err)]
    async fn ensure_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        if api.get_opt(namespace).await?.is_some() {
            return Ok(());
        }
        let object = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.patch(namespace, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&object))
            .await?;
        info!("Created namespace {}", namespace);
        Ok(())
    }

    #[instrument(skip(self, object), fields(kind = %object.kind(), name = object.name()), err)]
    async fn apply(&self, namespace: &str, object: &WorkloadObject) -> anyhow::Result<()> {
        match object {
            WorkloadObject::Secret(o) => self.apply_object(namespace, o).await,
            WorkloadObject::ConfigMap(o) => self.apply_object(namespace, o).await,
            WorkloadObject::PersistentVolumeClaim(o) => self.apply_object(namespace, o).await,
            WorkloadObject::Deployment(o) => self.apply_object(namespace, o).await,
            WorkloadObject::Service(o) => self.apply_object(namespace, o).await,
        }
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, namespace: &str, kind: WorkloadKind, name: &str) -> anyhow::Result<bool> {
        let deleted = match kind {
            WorkloadKind::Secret => self.delete_object::<Secret>(namespace, name).await?,
            WorkloadKind::ConfigMap => self.delete_object::<ConfigMap>(namespace, name).await?,
            WorkloadKind::PersistentVolumeClaim => self.delete_object::<PersistentVolumeClaim>(namespace, name).await?,
            WorkloadKind::Deployment => self.delete_object::<Deployment>(namespace, name).await?,
            WorkloadKind::Service => self.delete_object::<Service>(namespace, name).await?,
        };
        if !deleted {
            debug!("{} {}/{} was already gone", kind, namespace, name);
        }
        Ok(deleted)
    }

    #[instrument(skip(self), err)]
    async fn workload_status(&self, namespace: &str, name: &str) -> anyhow::Result<Option<WorkloadStatus>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let Some(deployment) = api.get_opt(name).await? else {
            return Ok(None);
        };
        let ready_replicas = deployment.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
        Ok(Some(WorkloadStatus {
            uid: deployment.metadata.uid.clone(),
            ready: ready_replicas > 0,
        }))
    }
}

/// One Kubernetes client per configured cluster
pub async fn connect_clusters(configs: &[ClusterConfig]) -> anyhow::Result<Clusters> {
    let mut clusters = Vec::with_capacity(configs.len());
    for config in configs {
        let client = KubeClusterClient::connect(config.context.as_deref())
            .await
            .with_context(|| format!("connecting to cluster '{}'", config.id))?;
        info!("Connected to cluster {} ({})", config.id, config.domain);
        clusters.push(Cluster {
            id: config.id.clone(),
            domain: config.domain.clone(),
            client: Arc::new(client),
        });
    }
    Ok(Clusters::new(clusters))
}
