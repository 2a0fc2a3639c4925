//! Server lifecycle: bringing cluster workloads up and down, tracking their readiness, and
//! server-level diagnostics.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::registry::ServerRegistry;
use crate::cluster::manifests::{self, MYSQL_PORT, WorkloadSpec};
use crate::cluster::{Cluster, Clusters, WorkloadNames, WorkloadObject};
use crate::config::{ProvisioningConfig, ServerTemplate};
use crate::db::handlers::{DatabaseStore, ProvisionStore, Stores, UserStore};
use crate::db::models::databases::DatabaseFilter;
use crate::db::models::provisions::ProvisionFilter;
use crate::db::models::servers::{Endpoint, ServerCreateDBRequest, ServerDBResponse, ServerUpdateDBRequest};
use crate::db::models::users::UserFilter;
use crate::errors::{Error, Result};
use crate::mysql::{AdminConnector, QueryRow, statements};
use crate::names::{generate_password, server_name, validate_dns_label};
use crate::types::{ServerId, abbrev_uuid};

const ROOT_USERNAME: &str = "root";

#[derive(Debug, Clone)]
pub struct ProvisionServer {
    pub cluster_id: String,
    /// The configured default namespace when absent
    pub namespace: Option<String>,
    pub zone: Option<String>,
}

/// What a cluster says about one server workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadReport {
    pub cluster_id: String,
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
    pub ready: bool,
}

/// Address a cluster-hosted server is reachable at through its service
pub fn endpoint_for(name: &str, namespace: &str, domain: &str) -> Endpoint {
    Endpoint {
        hostname: format!("{name}.{namespace}.svc.{domain}"),
        port: MYSQL_PORT,
    }
}

#[derive(Clone)]
pub struct ServerFleetProvisioner {
    registry: ServerRegistry,
    databases: DatabaseStore,
    users: UserStore,
    provisions: ProvisionStore,
    connector: Arc<dyn AdminConnector>,
    clusters: Clusters,
    template: ServerTemplate,
    settings: ProvisioningConfig,
}

impl ServerFleetProvisioner {
    pub fn new(
        registry: ServerRegistry,
        stores: &Stores,
        connector: Arc<dyn AdminConnector>,
        clusters: Clusters,
        template: ServerTemplate,
        settings: ProvisioningConfig,
    ) -> Self {
        Self {
            registry,
            databases: stores.databases.clone(),
            users: stores.users.clone(),
            provisions: stores.provisions.clone(),
            connector,
            clusters,
            template,
            settings,
        }
    }

    /// Record a new server and apply its workload objects.
    ///
    /// The record has no endpoint until the workload reports ready. If any object fails to
    /// apply, the objects applied so far are deleted and the record removed.
    #[instrument(skip(self, request), fields(cluster = %request.cluster_id, zone = ?request.zone), err)]
    pub async fn provision_server(&self, request: ProvisionServer) -> Result<ServerDBResponse> {
        let cluster = self.clusters.get(&request.cluster_id)?;
        let namespace = request
            .namespace
            .unwrap_or_else(|| self.settings.default_namespace.clone());
        validate_dns_label("Namespace", &namespace)?;

        let name = self.unused_name(cluster, &namespace).await?;
        let root_password = generate_password(self.settings.server_password_length);

        cluster
            .client
            .ensure_namespace(&namespace)
            .await
            .map_err(|e| Error::physical(format!("ensure namespace {namespace}"), e))?;

        let objects = manifests::server_workload(
            WorkloadSpec {
                name: &name,
                root_password: &root_password,
                zone: request.zone.as_deref(),
            },
            &self.template,
        );

        let server = self
            .registry
            .create_pending(&ServerCreateDBRequest {
                name: name.clone(),
                cluster_id: Some(cluster.id.clone()),
                namespace: Some(namespace.clone()),
                endpoint: None,
                username: ROOT_USERNAME.to_string(),
                password: root_password,
                zone: request.zone,
            })
            .await?;

        if let Err(e) = self.apply_all(cluster, &namespace, &objects).await {
            if let Err(remove_err) = self.registry.remove(server.id).await {
                error!("Failed to remove record of server {} after apply failed: {}", name, remove_err);
            }
            return Err(e);
        }

        info!("Provisioned server {} in {}/{}", name, cluster.id, namespace);
        Ok(server)
    }

    async fn apply_all(&self, cluster: &Cluster, namespace: &str, objects: &[WorkloadObject]) -> Result<()> {
        for (applied, object) in objects.iter().enumerate() {
            if let Err(e) = cluster.client.apply(namespace, object).await {
                for done in objects[..applied].iter().rev() {
                    if let Err(delete_err) = cluster.client.delete(namespace, done.kind(), done.name()).await {
                        error!("Failed to roll back {} {}: {:#}", done.kind(), done.name(), delete_err);
                    }
                }
                return Err(Error::physical(format!("apply {} {}", object.kind(), object.name()), e));
            }
        }
        Ok(())
    }

    async fn unused_name(&self, cluster: &Cluster, namespace: &str) -> Result<String> {
        for _ in 0..self.settings.name_attempts {
            let name = server_name();
            if self.registry.find_workload(&cluster.id, namespace, &name).await?.is_none() {
                return Ok(name);
            }
        }
        Err(Error::Conflict {
            message: format!(
                "No unused server name in {}/{} after {} attempts",
                cluster.id, namespace, self.settings.name_attempts
            ),
        })
    }

    /// Delete a server's workload objects, then its record.
    ///
    /// Refused with `Conflict` while any database, user or provision record still points at
    /// the server. Objects that are already gone are skipped. Externally registered servers
    /// only lose their record.
    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn deprovision_server(&self, id: ServerId) -> Result<ServerId> {
        let server = self.registry.resolve(id).await?;
        self.ensure_no_dependents(&server).await?;

        if let (Some(cluster_id), Some(namespace)) = (&server.cluster_id, &server.namespace) {
            let cluster = self.clusters.get(cluster_id)?;
            let names = WorkloadNames::for_server(&server.name);
            for (kind, name) in names.objects().into_iter().rev() {
                let deleted = cluster
                    .client
                    .delete(namespace, kind, name)
                    .await
                    .map_err(|e| Error::physical(format!("delete {kind} {name}"), e))?;
                if !deleted {
                    debug!("{} {} was already gone", kind, name);
                }
            }
        }

        self.registry.remove(server.id).await?;
        info!("Deprovisioned server {}", server.name);
        Ok(server.id)
    }

    async fn ensure_no_dependents(&self, server: &ServerDBResponse) -> Result<()> {
        let databases = self
            .databases
            .list(&DatabaseFilter {
                server_id: Some(server.id),
                ..Default::default()
            })
            .await?
            .len();
        let users = self
            .users
            .list(&UserFilter {
                server_id: Some(server.id),
                ..Default::default()
            })
            .await?
            .len();
        let provisions = self
            .provisions
            .list(&ProvisionFilter {
                server_id: Some(server.id),
                ..Default::default()
            })
            .await?
            .len();

        if databases + users + provisions > 0 {
            return Err(Error::Conflict {
                message: format!(
                    "Server {} still has {databases} database(s), {users} user(s) and {provisions} provision(s)",
                    server.name
                ),
            });
        }
        Ok(())
    }

    /// Fold a workload report into the matching server record.
    ///
    /// Records the uid, sets the endpoint when the workload is ready and clears it when it
    /// is not. Reports for workloads no record knows about are ignored.
    #[instrument(skip(self, report), fields(cluster = %report.cluster_id, name = %report.name, ready = report.ready), err)]
    pub async fn on_workload_reported(&self, report: WorkloadReport) -> Result<Option<ServerDBResponse>> {
        let Some(server) = self
            .registry
            .find_workload(&report.cluster_id, &report.namespace, &report.name)
            .await?
        else {
            debug!("No server record for workload {}/{}", report.namespace, report.name);
            return Ok(None);
        };
        let cluster = self.clusters.get(&report.cluster_id)?;

        let endpoint = report
            .ready
            .then(|| endpoint_for(&server.name, &report.namespace, &cluster.domain));
        let update = ServerUpdateDBRequest {
            endpoint: (server.endpoint != endpoint).then_some(endpoint),
            uid: (report.uid.is_some() && server.uid != report.uid).then_some(report.uid),
        };
        if update.endpoint.is_none() && update.uid.is_none() {
            return Ok(Some(server));
        }

        let updated = self.registry.update(server.id, &update).await?;
        match (&server.endpoint, &updated.endpoint) {
            (None, Some(endpoint)) => info!("Server {} is ready at {}:{}", updated.name, endpoint.hostname, endpoint.port),
            (Some(_), None) => warn!("Server {} is no longer ready", updated.name),
            _ => {}
        }
        Ok(Some(updated))
    }

    /// Ask each cluster about every server it hosts.
    ///
    /// Pending servers gain their endpoint once ready. Ready servers whose deployment is no
    /// longer ready, or no longer exists, lose it and stop being selectable. Returns how many
    /// records changed. A failure for one server is logged and does not stop the others.
    pub async fn refresh_workloads(&self) -> Result<usize> {
        let mut changed = 0;
        for server in self.registry.cluster_hosted().await? {
            let (Some(cluster_id), Some(namespace)) = (server.cluster_id.clone(), server.namespace.clone()) else {
                continue;
            };
            let cluster = match self.clusters.get(&cluster_id) {
                Ok(cluster) => cluster,
                Err(e) => {
                    warn!("Skipping server {}: {}", server.name, e);
                    continue;
                }
            };
            let (uid, ready) = match cluster.client.workload_status(&namespace, &server.name).await {
                Ok(Some(status)) => (status.uid, status.ready),
                Ok(None) => {
                    if server.is_ready() {
                        warn!("Deployment of server {} is gone", server.name);
                    }
                    (None, false)
                }
                Err(e) => {
                    warn!("Failed to read status of server {}: {:#}", server.name, e);
                    continue;
                }
            };

            let report = WorkloadReport {
                cluster_id,
                namespace,
                name: server.name.clone(),
                uid,
                ready,
            };
            match self.on_workload_reported(report).await {
                Ok(Some(updated)) if updated != server => changed += 1,
                Ok(_) => {}
                Err(e) => warn!("Failed to update server {}: {}", server.name, e),
            }
        }
        Ok(changed)
    }

    /// Accounts known to the server, from `mysql.user`
    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn server_users(&self, id: ServerId) -> Result<Vec<QueryRow>> {
        self.server_query(id, "list users of", statements::SERVER_USERS).await
    }

    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn server_databases(&self, id: ServerId) -> Result<Vec<QueryRow>> {
        self.server_query(id, "list databases of", statements::SERVER_DATABASES).await
    }

    /// Slow-query counters from the global status
    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn server_status(&self, id: ServerId) -> Result<Vec<QueryRow>> {
        self.server_query(id, "read status of", statements::SERVER_SLOW_STATUS).await
    }

    async fn server_query(&self, id: ServerId, action: &str, query: &str) -> Result<Vec<QueryRow>> {
        let server = self.registry.resolve(id).await?;
        let credentials = server.admin_credentials()?;
        self.connector
            .query(&credentials, query)
            .await
            .map_err(|e| Error::physical(format!("{action} server {}", server.name), e))
    }
}
