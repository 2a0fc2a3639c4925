//! Provisioning saga: server selection, database, user, grant and the binding record.
//!
//! ```text
//! Requested → ServerSelected → DatabaseCreated → UserCreated → Granted → Bound
//! ```
//!
//! Each completed stage that changed something pushes a [`Compensation`]. When a later stage
//! fails the compensations run newest first, and the per-step outcomes are collected into a
//! [`CompensationReport`] before the original error is returned.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::databases::{CreateDatabase, DatabaseLifecycleManager};
use super::registry::ServerRegistry;
use super::users::{CreateUser, UserLifecycleManager};
use crate::config::ProvisioningConfig;
use crate::db::handlers::ProvisionStore;
use crate::db::models::provisions::{ProvisionCreateDBRequest, ProvisionDBResponse};
use crate::errors::{Error, Result};
use crate::names::{MAX_IDENTIFIER_LEN, MAX_USERNAME_LEN, generate_password, prefixed_name, validate_identifier};
use crate::types::{DatabaseId, DbUserId, ProvisionId, Resource, ServerId, abbrev_uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStage {
    Requested,
    ServerSelected,
    DatabaseCreated,
    UserCreated,
    Granted,
    Bound,
}

/// Undo step recorded by a completed stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    RemoveDatabase(DatabaseId),
    RemoveUser(DbUserId),
    Revoke { user_id: DbUserId, database_id: DatabaseId },
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::RemoveDatabase(id) => write!(f, "remove database {}", abbrev_uuid(id)),
            Compensation::RemoveUser(id) => write!(f, "remove user {}", abbrev_uuid(id)),
            Compensation::Revoke { user_id, database_id } => {
                write!(f, "revoke {} from {}", abbrev_uuid(database_id), abbrev_uuid(user_id))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompensationOutcome {
    pub compensation: Compensation,
    pub result: std::result::Result<(), String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompensationReport {
    /// Last stage reached before the failure
    pub reached: ProvisionStage,
    pub outcomes: Vec<CompensationOutcome>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    pub zone: Option<String>,
    /// Name prefix for the generated database and user; the configured default when absent
    pub prefix: Option<String>,
}

/// Everything a tenant needs to connect
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionBundle {
    pub username: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub uri: String,
}

impl fmt::Debug for ConnectionBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBundle")
            .field("username", &self.username)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl ConnectionBundle {
    pub fn new(username: String, password: String, database: String, host: String, port: u16) -> Self {
        let uri = format!("mysql://{username}:{password}@{host}:{port}/{database}");
        Self {
            username,
            password,
            database,
            host,
            port,
            uri,
        }
    }

    /// The bundle as `MYSQL_*` environment variables
    pub fn to_env(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("MYSQL_USERNAME", self.username.clone()),
            ("MYSQL_PASSWORD", self.password.clone()),
            ("MYSQL_DATABASE", self.database.clone()),
            ("MYSQL_HOST", self.host.clone()),
            ("MYSQL_PORT", self.port.to_string()),
            ("MYSQL_URI", self.uri.clone()),
        ])
    }
}

/// In-flight saga state for one provision request
struct Saga {
    stage: ProvisionStage,
    compensations: Vec<Compensation>,
}

impl Saga {
    fn new() -> Self {
        Self {
            stage: ProvisionStage::Requested,
            compensations: Vec::new(),
        }
    }

    fn advance(&mut self, stage: ProvisionStage, compensation: Option<Compensation>) {
        self.stage = stage;
        self.compensations.extend(compensation);
    }
}

#[derive(Clone)]
pub struct ProvisionOrchestrator {
    registry: ServerRegistry,
    databases: DatabaseLifecycleManager,
    users: UserLifecycleManager,
    provisions: ProvisionStore,
    settings: ProvisioningConfig,
}

impl ProvisionOrchestrator {
    pub fn new(
        registry: ServerRegistry,
        databases: DatabaseLifecycleManager,
        users: UserLifecycleManager,
        provisions: ProvisionStore,
        settings: ProvisioningConfig,
    ) -> Self {
        Self {
            registry,
            databases,
            users,
            provisions,
            settings,
        }
    }

    /// Lease a new database and user on a selected server.
    #[instrument(skip(self, request), fields(zone = ?request.zone), err)]
    pub async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionDBResponse> {
        let prefix = request.prefix.unwrap_or_else(|| self.settings.default_prefix.clone());
        let suffix_len = self.settings.suffix_length;
        validate_identifier("Prefix", &prefix, MAX_USERNAME_LEN.saturating_sub(suffix_len + 1))?;

        let mut saga = Saga::new();
        match self.run(&mut saga, &prefix, request.zone.as_deref()).await {
            Ok(provision) => Ok(provision),
            Err(e) => {
                warn!("Provisioning failed after stage {:?}: {}", saga.stage, e);
                let report = self.compensate(saga).await;
                if report.is_clean() {
                    info!("Rolled back {} provisioning step(s)", report.outcomes.len());
                } else {
                    for outcome in report.outcomes.iter().filter(|o| o.result.is_err()) {
                        error!("Compensation '{}' failed: {:?}", outcome.compensation, outcome.result);
                    }
                }
                Err(e)
            }
        }
    }

    async fn run(&self, saga: &mut Saga, prefix: &str, zone: Option<&str>) -> Result<ProvisionDBResponse> {
        let server = self.registry.select_server(zone).await?;
        saga.advance(ProvisionStage::ServerSelected, None);

        let database_name = self.unused_database_name(server.id, prefix).await?;
        let database = self
            .databases
            .create(CreateDatabase {
                server_id: server.id,
                name: database_name,
                connection_limit: None,
            })
            .await?;
        saga.advance(ProvisionStage::DatabaseCreated, Some(Compensation::RemoveDatabase(database.id)));

        let username = self.unused_username(server.id, prefix).await?;
        let user = self
            .users
            .create(CreateUser {
                server_id: server.id,
                username,
                password: generate_password(self.settings.user_password_length),
                databases: Vec::new(),
            })
            .await?;
        saga.advance(ProvisionStage::UserCreated, Some(Compensation::RemoveUser(user.id)));

        self.users.grant(user.id, database.id).await?;
        saga.advance(
            ProvisionStage::Granted,
            Some(Compensation::Revoke {
                user_id: user.id,
                database_id: database.id,
            }),
        );

        let provision = self
            .provisions
            .create(&ProvisionCreateDBRequest {
                server_id: server.id,
                database_id: database.id,
                user_id: user.id,
            })
            .await?;
        saga.advance(ProvisionStage::Bound, None);

        info!(
            "Provisioned {} / {} on server {}",
            database.name, user.username, server.name
        );
        Ok(provision)
    }

    async fn compensate(&self, saga: Saga) -> CompensationReport {
        let mut outcomes = Vec::with_capacity(saga.compensations.len());
        for compensation in saga.compensations.into_iter().rev() {
            let result = match compensation {
                Compensation::Revoke { user_id, database_id } => self.users.revoke(user_id, database_id).await.map(|_| ()),
                Compensation::RemoveUser(id) => self.users.remove(id).await.map(|_| ()),
                Compensation::RemoveDatabase(id) => self.databases.remove(id).await.map(|_| ()),
            };
            outcomes.push(CompensationOutcome {
                compensation,
                result: result.map_err(|e| e.to_string()),
            });
        }
        CompensationReport {
            reached: saga.stage,
            outcomes,
        }
    }

    async fn unused_database_name(&self, server_id: ServerId, prefix: &str) -> Result<String> {
        for _ in 0..self.settings.name_attempts {
            let name = prefixed_name(prefix, self.settings.suffix_length);
            validate_identifier("Database name", &name, MAX_IDENTIFIER_LEN)?;
            if self.databases.find(server_id, &name).await?.is_none() {
                return Ok(name);
            }
        }
        Err(self.names_exhausted("database", prefix))
    }

    async fn unused_username(&self, server_id: ServerId, prefix: &str) -> Result<String> {
        for _ in 0..self.settings.name_attempts {
            let name = prefixed_name(prefix, self.settings.suffix_length);
            if self.users.find(server_id, &name).await?.is_none() {
                return Ok(name);
            }
        }
        Err(self.names_exhausted("user", prefix))
    }

    fn names_exhausted(&self, kind: &str, prefix: &str) -> Error {
        Error::Conflict {
            message: format!(
                "No unused {kind} name with prefix {prefix} after {} attempts",
                self.settings.name_attempts
            ),
        }
    }

    /// Tear down a provision: revoke, remove database, remove user, remove the record.
    ///
    /// Every referenced record is resolved before anything is changed, so a provision whose
    /// database has already gone fails with `NotFound` without touching the server.
    #[instrument(skip(self), fields(provision_id = %abbrev_uuid(&id)), err)]
    pub async fn deprovision(&self, id: ProvisionId) -> Result<ProvisionId> {
        let provision = self.get(id).await?;
        let server = self.registry.resolve(provision.server_id).await?;
        let database = self.databases.resolve(provision.database_id).await?;
        let user = self.users.resolve(provision.user_id).await?;

        self.users.revoke(user.id, database.id).await?;
        self.databases.remove(database.id).await?;
        self.users.remove(user.id).await?;
        self.provisions.delete(provision.id).await?;

        info!(
            "Deprovisioned {} / {} from server {}",
            database.name, user.username, server.name
        );
        Ok(provision.id)
    }

    /// Connection details for a provision
    #[instrument(skip(self), fields(provision_id = %abbrev_uuid(&id)), err)]
    pub async fn pack(&self, id: ProvisionId) -> Result<ConnectionBundle> {
        let provision = self.get(id).await?;
        let server = self.registry.resolve(provision.server_id).await?;
        let database = self.databases.resolve(provision.database_id).await?;
        let user = self.users.resolve(provision.user_id).await?;
        let endpoint = server.endpoint.ok_or_else(|| Error::ServerNotReady {
            id: server.id.to_string(),
        })?;

        Ok(ConnectionBundle::new(
            user.username,
            user.password,
            database.name,
            endpoint.hostname,
            endpoint.port,
        ))
    }

    pub async fn get(&self, id: ProvisionId) -> Result<ProvisionDBResponse> {
        self.provisions
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Provision, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::databases::DatabaseFilter;
    use crate::db::models::provisions::ProvisionFilter;
    use crate::db::models::users::UserFilter;
    use crate::test_utils::Harness;

    #[tokio::test]
    async fn test_provision_then_pack_yields_matching_uri() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;

        let provision = h.orchestrator.provision(ProvisionRequest::default()).await.unwrap();
        let bundle = h.orchestrator.pack(provision.id).await.unwrap();

        let database = h.databases.resolve(provision.database_id).await.unwrap();
        let user = h.users.resolve(provision.user_id).await.unwrap();
        assert_eq!(provision.server_id, server.id);
        assert!(database.name.starts_with("provision_"));
        assert!(user.username.starts_with("provision_"));
        assert_eq!(user.databases, vec![database.id]);
        assert_eq!(
            bundle.uri,
            format!(
                "mysql://{}:{}@alpha.db.internal:3306/{}",
                user.username, user.password, database.name
            )
        );
        assert_eq!(bundle.to_env()["MYSQL_PORT"], "3306");
        assert_eq!(bundle.to_env()["MYSQL_DATABASE"], database.name);
    }

    #[tokio::test]
    async fn test_provision_uses_prefix_and_zone() {
        let h = Harness::new();
        h.ready_server("alpha", Some("ca")).await;
        let eu = h.ready_server("beta", Some("eu")).await;

        let provision = h
            .orchestrator
            .provision(ProvisionRequest {
                zone: Some("eu".to_string()),
                prefix: Some("lease".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(provision.server_id, eu.id);
        let database = h.databases.resolve(provision.database_id).await.unwrap();
        assert!(database.name.starts_with("lease_"));
        assert_eq!(database.name.len(), "lease_".len() + 4);
    }

    #[tokio::test]
    async fn test_provision_in_empty_zone_falls_back() {
        let h = Harness::new();
        let ca = h.ready_server("alpha", Some("ca")).await;

        let provision = h
            .orchestrator
            .provision(ProvisionRequest {
                zone: Some("eu".to_string()),
                prefix: None,
            })
            .await
            .unwrap();
        assert_eq!(provision.server_id, ca.id);
    }

    #[tokio::test]
    async fn test_provision_without_servers_fails() {
        let h = Harness::new();
        let err = h.orchestrator.provision(ProvisionRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::NoAvailableServer { .. }));
    }

    #[tokio::test]
    async fn test_user_failure_compensates_database() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        h.connector.fail_on("CREATE USER");

        let err = h.orchestrator.provision(ProvisionRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::PhysicalExecution { .. }));

        let filter = DatabaseFilter {
            server_id: Some(server.id),
            ..Default::default()
        };
        assert!(h.stores.databases.list(&filter).await.unwrap().is_empty());
        assert!(h.connector.statements().iter().any(|s| s.starts_with("DROP DATABASE")));
    }

    #[tokio::test]
    async fn test_grant_failure_compensates_user_and_database() {
        let h = Harness::new();
        h.ready_server("alpha", None).await;
        h.connector.fail_on("GRANT");

        assert!(h.orchestrator.provision(ProvisionRequest::default()).await.is_err());

        assert!(h.stores.databases.list(&DatabaseFilter::default()).await.unwrap().is_empty());
        assert!(h.stores.users.list(&UserFilter::default()).await.unwrap().is_empty());
        assert!(h.stores.provisions.list(&ProvisionFilter::default()).await.unwrap().is_empty());

        let statements = h.connector.statements();
        let drop_user = statements.iter().position(|s| s.starts_with("DROP USER")).unwrap();
        let drop_db = statements.iter().position(|s| s.starts_with("DROP DATABASE")).unwrap();
        assert!(drop_user < drop_db, "compensations run newest first");
    }

    #[tokio::test]
    async fn test_deprovision_removes_everything() {
        let h = Harness::new();
        h.ready_server("alpha", None).await;
        let provision = h.orchestrator.provision(ProvisionRequest::default()).await.unwrap();
        let user = h.users.resolve(provision.user_id).await.unwrap();

        let removed = h.orchestrator.deprovision(provision.id).await.unwrap();
        assert_eq!(removed, provision.id);

        assert!(h.databases.resolve(provision.database_id).await.is_err());
        assert!(h.users.resolve(provision.user_id).await.is_err());
        assert!(matches!(
            h.orchestrator.get(provision.id).await,
            Err(Error::NotFound { resource: Resource::Provision, .. })
        ));

        let statements = h.connector.statements();
        let tail: Vec<_> = statements.iter().rev().take(3).rev().map(|s| s.split(' ').next().unwrap()).collect();
        assert_eq!(tail, vec!["REVOKE", "DROP", "DROP"]);
        assert!(statements.last().unwrap().contains(&user.username));
    }

    #[tokio::test]
    async fn test_deprovision_with_removed_database_is_not_found() {
        let h = Harness::new();
        h.ready_server("alpha", None).await;
        let provision = h.orchestrator.provision(ProvisionRequest::default()).await.unwrap();
        h.stores.databases.delete(provision.database_id).await.unwrap();
        let before = h.connector.statements().len();

        let err = h.orchestrator.deprovision(provision.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::Database, .. }));
        assert_eq!(h.connector.statements().len(), before);
    }

    #[tokio::test]
    async fn test_pack_unknown_provision() {
        let h = Harness::new();
        let err = h.orchestrator.pack(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::Provision, .. }));
    }

    #[tokio::test]
    async fn test_invalid_prefix_rejected_before_selection() {
        let h = Harness::new();
        let err = h
            .orchestrator
            .provision(ProvisionRequest {
                zone: None,
                prefix: Some("drop table".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[test]
    fn test_bundle_debug_hides_password() {
        let bundle = ConnectionBundle::new("u".into(), "secretpw".into(), "d".into(), "h".into(), 3306);
        assert!(!format!("{bundle:?}").contains("secretpw"));
        assert_eq!(bundle.uri, "mysql://u:secretpw@h:3306/d");
    }
}
