//! User records, their physical accounts, and the authorization list.
//!
//! The authorization list (`databases` on the user record) tracks which databases the
//! account has been granted on its server. It has set semantics: granting twice stores the
//! id once.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::registry::ServerRegistry;
use crate::db::errors::DbError;
use crate::db::handlers::{DatabaseStore, UserStore};
use crate::db::models::databases::DatabaseDBResponse;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::events::{EventBus, LifecycleEvent};
use crate::mysql::{AdminConnector, AdminCredentials, statements};
use crate::names::{MAX_USERNAME_LEN, validate_identifier};
use crate::types::{DatabaseId, DbUserId, Resource, ServerId, abbrev_uuid};

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub server_id: ServerId,
    pub username: String,
    pub password: String,
    /// Databases to grant right after the account is created
    pub databases: Vec<DatabaseId>,
}

/// Outcome of revoking one user during a database sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub user_id: DbUserId,
    pub username: String,
    /// `Err` carries the failure message; the list entry is removed either way
    pub result: std::result::Result<(), String>,
}

/// Per-user results of revoking every user from a removed database
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub database_id: DatabaseId,
    pub database_name: String,
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &SweepOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

#[derive(Clone)]
pub struct UserLifecycleManager {
    registry: ServerRegistry,
    databases: DatabaseStore,
    users: UserStore,
    connector: Arc<dyn AdminConnector>,
    events: EventBus,
}

impl UserLifecycleManager {
    pub fn new(
        registry: ServerRegistry,
        databases: DatabaseStore,
        users: UserStore,
        connector: Arc<dyn AdminConnector>,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            databases,
            users,
            connector,
            events,
        }
    }

    /// Record the user, create the account, then grant the initial databases.
    ///
    /// Any failure after the record exists undoes the whole creation: the account is
    /// dropped (best effort) and the record deleted.
    #[instrument(skip(self, request), fields(username = %request.username, server_id = %abbrev_uuid(&request.server_id)), err)]
    pub async fn create(&self, request: CreateUser) -> Result<UserDBResponse> {
        validate_identifier("Username", &request.username, MAX_USERNAME_LEN)?;
        if request.password.is_empty() {
            return Err(Error::BadRequest {
                message: "Password must not be empty".to_string(),
            });
        }

        let server = self.registry.resolve(request.server_id).await?;
        let credentials = server.admin_credentials()?;

        let mut initial = Vec::with_capacity(request.databases.len());
        for database_id in &request.databases {
            if initial.iter().any(|d: &DatabaseDBResponse| d.id == *database_id) {
                continue;
            }
            let database = self.resolve_database(*database_id).await?;
            ensure_same_server(&database, server.id)?;
            initial.push(database);
        }

        if self.find(server.id, &request.username).await?.is_some() {
            return Err(user_exists(&request.username, &server.name));
        }

        let user = self
            .users
            .create(&UserCreateDBRequest {
                server_id: server.id,
                username: request.username.clone(),
                password: request.password.clone(),
                databases: Vec::new(),
            })
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => user_exists(&request.username, &server.name),
                other => other.into(),
            })?;

        if let Err(e) = self
            .connector
            .execute(&credentials, &statements::create_user(&user.username, &user.password))
            .await
        {
            self.delete_record(&user).await;
            return Err(Error::physical(format!("create user {}", user.username), e));
        }

        let mut user = user;
        for database in &initial {
            match self.grant_physical(&credentials, &user, database).await {
                Ok(updated) => user = updated,
                Err(e) => {
                    if let Err(drop_err) = self
                        .connector
                        .execute(&credentials, &statements::drop_user(&user.username))
                        .await
                    {
                        error!("Failed to drop user {} after grant failed: {:#}", user.username, drop_err);
                    }
                    self.delete_record(&user).await;
                    return Err(e);
                }
            }
        }

        info!("Created user {} on server {}", user.username, server.name);
        self.events.publish(LifecycleEvent::UserCreated(user.clone()));
        Ok(user)
    }

    /// Drop the account on its server, then delete the record.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn remove(&self, id: DbUserId) -> Result<UserDBResponse> {
        let user = self.resolve(id).await?;
        let server = self.registry.resolve(user.server_id).await?;
        let credentials = server.admin_credentials()?;

        self.connector
            .execute(&credentials, &statements::drop_user(&user.username))
            .await
            .map_err(|e| Error::physical(format!("drop user {}", user.username), e))?;

        if !self.users.delete(user.id).await? {
            warn!("User record {} vanished during removal", abbrev_uuid(&user.id));
        }

        info!("Removed user {} from server {}", user.username, server.name);
        self.events.publish(LifecycleEvent::UserRemoved(user.clone()));
        Ok(user)
    }

    /// Grant the user the fixed privilege set on a database of the same server.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), database_id = %abbrev_uuid(&database_id)), err)]
    pub async fn grant(&self, user_id: DbUserId, database_id: DatabaseId) -> Result<UserDBResponse> {
        let user = self.resolve(user_id).await?;
        let database = self.resolve_database(database_id).await?;
        let server = self.registry.resolve(database.server_id).await?;
        ensure_same_server(&database, user.server_id)?;
        let credentials = server.admin_credentials()?;

        self.grant_physical(&credentials, &user, &database).await
    }

    /// Take the privilege set away again and drop the database from the user's list.
    ///
    /// The list entry is removed first; if the `REVOKE` then fails the entry is restored.
    /// Revoking a database the list does not contain changes nothing.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), database_id = %abbrev_uuid(&database_id)), err)]
    pub async fn revoke(&self, user_id: DbUserId, database_id: DatabaseId) -> Result<UserDBResponse> {
        let user = self.resolve(user_id).await?;
        let database = self.resolve_database(database_id).await?;
        let server = self.registry.resolve(database.server_id).await?;
        let credentials = server.admin_credentials()?;

        if !user.has_access_to(database.id) {
            return Ok(user);
        }

        let updated = self.edit_list(user.id, UserUpdateDBRequest::remove(database.id)).await?;

        if let Err(e) = self
            .connector
            .execute(&credentials, &statements::revoke(&database.name, &user.username))
            .await
        {
            if let Err(restore_err) = self.edit_list(user.id, UserUpdateDBRequest::add(database.id)).await {
                error!(
                    "Failed to restore authorization list of {} after revoke failed: {}",
                    user.username, restore_err
                );
            }
            return Err(Error::physical(
                format!("revoke {} from user {}", database.name, user.username),
                e,
            ));
        }

        Ok(updated)
    }

    /// Revoke every user whose list contains a database that has just been removed.
    ///
    /// The database no longer exists, so list entries go regardless of whether the physical
    /// `REVOKE` succeeds. One user's failure does not stop the others.
    #[instrument(skip(self, database), fields(database_id = %abbrev_uuid(&database.id), name = %database.name))]
    pub async fn sweep_database(&self, database: &DatabaseDBResponse) -> SweepReport {
        let mut report = SweepReport {
            database_id: database.id,
            database_name: database.name.clone(),
            outcomes: Vec::new(),
        };

        let users = match self.users.list(&UserFilter::with_access_to(database.id)).await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to list users granted {}: {}", database.name, e);
                return report;
            }
        };
        if users.is_empty() {
            return report;
        }

        let credentials = match self.registry.resolve(database.server_id).await {
            Ok(server) => server.admin_credentials(),
            Err(e) => Err(e),
        };

        for user in users {
            let result = self.sweep_user(&user, database, credentials.as_ref()).await;
            report.outcomes.push(SweepOutcome {
                user_id: user.id,
                username: user.username,
                result: result.map_err(|e| e.to_string()),
            });
        }
        report
    }

    async fn sweep_user(
        &self,
        user: &UserDBResponse,
        database: &DatabaseDBResponse,
        credentials: std::result::Result<&AdminCredentials, &Error>,
    ) -> Result<()> {
        // Removes only this id from the current row; the listed snapshot may be stale
        self.edit_list(user.id, UserUpdateDBRequest::remove(database.id)).await?;
        let credentials = credentials
            .map_err(|e| Error::physical(format!("reach the server of {}", database.name), anyhow::anyhow!("{e}")))?;
        self.connector
            .execute(credentials, &statements::revoke(&database.name, &user.username))
            .await
            .map_err(|e| Error::physical(format!("revoke {} from user {}", database.name, user.username), e))
    }

    pub async fn resolve(&self, id: DbUserId) -> Result<UserDBResponse> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::User, id))
    }

    pub async fn find(&self, server_id: ServerId, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.list(&UserFilter::named(server_id, username)).await?.into_iter().next())
    }

    async fn resolve_database(&self, id: DatabaseId) -> Result<DatabaseDBResponse> {
        self.databases
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Database, id))
    }

    async fn grant_physical(
        &self,
        credentials: &AdminCredentials,
        user: &UserDBResponse,
        database: &DatabaseDBResponse,
    ) -> Result<UserDBResponse> {
        self.connector
            .execute(credentials, &statements::grant(&database.name, &user.username))
            .await
            .map_err(|e| Error::physical(format!("grant {} to user {}", database.name, user.username), e))?;

        if user.has_access_to(database.id) {
            return Ok(user.clone());
        }
        self.edit_list(user.id, UserUpdateDBRequest::add(database.id)).await
    }

    async fn edit_list(&self, id: DbUserId, request: UserUpdateDBRequest) -> Result<UserDBResponse> {
        Ok(self.users.update(id, &request).await?)
    }

    async fn delete_record(&self, user: &UserDBResponse) {
        if let Err(e) = self.users.delete(user.id).await {
            error!("Failed to delete record for user {} after create failed: {}", user.username, e);
        }
    }
}

fn ensure_same_server(database: &DatabaseDBResponse, server_id: ServerId) -> Result<()> {
    if database.server_id == server_id {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!(
                "Database {} lives on a different server than the user",
                database.name
            ),
        })
    }
}

fn user_exists(username: &str, server: &str) -> Error {
    Error::Conflict {
        message: format!("User {username} already exists on server {server}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    #[tokio::test]
    async fn test_create_executes_create_user() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let mut events = h.events.subscribe();

        let user = h
            .users
            .create(CreateUser {
                server_id: server.id,
                username: "alice".to_string(),
                password: "pw123456".to_string(),
                databases: vec![],
            })
            .await
            .unwrap();

        assert!(user.databases.is_empty());
        assert_eq!(
            h.connector.statements(),
            vec!["CREATE USER 'alice'@'%' IDENTIFIED BY 'pw123456'".to_string()]
        );
        assert_eq!(events.recv().await.unwrap(), LifecycleEvent::UserCreated(user));
    }

    #[tokio::test]
    async fn test_create_with_initial_databases_grants_them_once() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;

        let user = h
            .users
            .create(CreateUser {
                server_id: server.id,
                username: "alice".to_string(),
                password: "pw123456".to_string(),
                databases: vec![db.id, db.id],
            })
            .await
            .unwrap();

        assert_eq!(user.databases, vec![db.id]);
        let grants = h.connector.statements().iter().filter(|s| s.starts_with("GRANT")).count();
        assert_eq!(grants, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_database_on_other_server() {
        let h = Harness::new();
        let alpha = h.ready_server("alpha", None).await;
        let beta = h.ready_server("beta", None).await;
        let db = h.database(&beta, "orders").await;

        let err = h
            .users
            .create(CreateUser {
                server_id: alpha.id,
                username: "alice".to_string(),
                password: "pw123456".to_string(),
                databases: vec![db.id],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert!(h.users.find(alpha.id, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_initial_grant_undoes_user() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;
        h.connector.fail_on("GRANT");

        let err = h
            .users
            .create(CreateUser {
                server_id: server.id,
                username: "alice".to_string(),
                password: "pw123456".to_string(),
                databases: vec![db.id],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PhysicalExecution { .. }));
        assert!(h.users.find(server.id, "alice").await.unwrap().is_none());
        assert_eq!(h.connector.statements().last().unwrap(), "DROP USER 'alice'@'%'");
    }

    #[tokio::test]
    async fn test_failed_create_user_deletes_record() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        h.connector.fail_on("CREATE USER");

        let result = h
            .users
            .create(CreateUser {
                server_id: server.id,
                username: "alice".to_string(),
                password: "pw123456".to_string(),
                databases: vec![],
            })
            .await;

        assert!(result.is_err());
        assert!(h.users.find(server.id, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grant_then_revoke_restores_list() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let existing = h.database(&server, "existing").await;
        let db = h.database(&server, "orders").await;
        let user = h.user(&server, "alice", &[existing.id]).await;

        let granted = h.users.grant(user.id, db.id).await.unwrap();
        assert_eq!(granted.databases, vec![existing.id, db.id]);

        let revoked = h.users.revoke(user.id, db.id).await.unwrap();
        assert_eq!(revoked.databases, user.databases);
        assert_eq!(
            h.connector.statements().last().unwrap(),
            "REVOKE CREATE VIEW, ALTER, SHOW VIEW, CREATE, INSERT, SELECT, DELETE, TRIGGER, REFERENCES, UPDATE, DROP, INDEX ON `orders`.* FROM 'alice'@'%'"
        );
    }

    #[tokio::test]
    async fn test_repeated_grant_keeps_single_entry() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;
        let user = h.user(&server, "alice", &[]).await;

        h.users.grant(user.id, db.id).await.unwrap();
        let again = h.users.grant(user.id, db.id).await.unwrap();
        assert_eq!(again.databases, vec![db.id]);
    }

    #[tokio::test]
    async fn test_grant_missing_database_is_not_found() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let user = h.user(&server, "alice", &[]).await;

        let err = h.users.grant(user.id, uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::Database, .. }));

        let err = h.users.grant(uuid::Uuid::new_v4(), uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::User, .. }));
    }

    #[tokio::test]
    async fn test_grant_failure_leaves_list_untouched() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;
        let user = h.user(&server, "alice", &[]).await;
        h.connector.fail_on("GRANT");

        assert!(h.users.grant(user.id, db.id).await.is_err());
        assert!(h.users.resolve(user.id).await.unwrap().databases.is_empty());
    }

    #[tokio::test]
    async fn test_failed_revoke_restores_list() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;
        let user = h.user(&server, "alice", &[db.id]).await;
        h.connector.fail_on("REVOKE");

        let err = h.users.revoke(user.id, db.id).await.unwrap_err();
        assert!(matches!(err, Error::PhysicalExecution { .. }));
        assert_eq!(h.users.resolve(user.id).await.unwrap().databases, vec![db.id]);
    }

    #[tokio::test]
    async fn test_revoke_of_ungranted_database_is_noop() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;
        let user = h.user(&server, "alice", &[]).await;
        let before = h.connector.statements().len();

        let unchanged = h.users.revoke(user.id, db.id).await.unwrap();
        assert_eq!(unchanged.databases, user.databases);
        assert_eq!(h.connector.statements().len(), before);
    }

    #[tokio::test]
    async fn test_sweep_isolates_failures_per_user() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let db = h.database(&server, "orders").await;
        let alice = h.user(&server, "alice", &[db.id]).await;
        let bob = h.user(&server, "bob", &[db.id]).await;
        let carol = h.user(&server, "carol", &[]).await;
        h.connector.fail_on("FROM 'alice'");

        let report = h.users.sweep_database(&db).await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.succeeded(), 1);
        let failed: Vec<_> = report.failed().map(|o| o.user_id).collect();
        assert_eq!(failed, vec![alice.id]);
        for id in [alice.id, bob.id, carol.id] {
            assert!(!h.users.resolve(id).await.unwrap().has_access_to(db.id));
        }
    }

    #[tokio::test]
    async fn test_sweep_keeps_grant_made_after_listing() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let orders = h.database(&server, "orders").await;
        let billing = h.database(&server, "billing").await;
        let stale = h.user(&server, "alice", &[orders.id]).await;
        h.users.grant(stale.id, billing.id).await.unwrap();

        let credentials = server.admin_credentials();
        h.users.sweep_user(&stale, &orders, credentials.as_ref()).await.unwrap();

        let current = h.users.resolve(stale.id).await.unwrap();
        assert_eq!(current.databases, vec![billing.id]);
    }

    #[tokio::test]
    async fn test_remove_drops_account() {
        let h = Harness::new();
        let server = h.ready_server("alpha", None).await;
        let user = h.user(&server, "alice", &[]).await;

        h.users.remove(user.id).await.unwrap();
        assert_eq!(h.connector.statements().last().unwrap(), "DROP USER 'alice'@'%'");
        assert!(matches!(h.users.resolve(user.id).await, Err(Error::NotFound { .. })));
    }
}
