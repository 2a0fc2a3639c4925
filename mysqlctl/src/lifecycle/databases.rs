//! Database records and their physical schemas.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::registry::ServerRegistry;
use crate::db::errors::DbError;
use crate::db::handlers::DatabaseStore;
use crate::db::models::databases::{DatabaseCreateDBRequest, DatabaseDBResponse, DatabaseFilter, DatabaseUpdateDBRequest};
use crate::db::models::servers::ServerDBResponse;
use crate::errors::{Error, Result};
use crate::events::{EventBus, LifecycleEvent};
use crate::mysql::{AdminConnector, QueryRow, statements};
use crate::names::{MAX_IDENTIFIER_LEN, validate_identifier};
use crate::types::{DatabaseId, Resource, ServerId, abbrev_uuid};

#[derive(Debug, Clone)]
pub struct CreateDatabase {
    pub server_id: ServerId,
    pub name: String,
    pub connection_limit: Option<u32>,
}

#[derive(Clone)]
pub struct DatabaseLifecycleManager {
    registry: ServerRegistry,
    databases: DatabaseStore,
    connector: Arc<dyn AdminConnector>,
    events: EventBus,
}

impl DatabaseLifecycleManager {
    pub fn new(registry: ServerRegistry, databases: DatabaseStore, connector: Arc<dyn AdminConnector>, events: EventBus) -> Self {
        Self {
            registry,
            databases,
            connector,
            events,
        }
    }

    /// Record the database, then create it on the server.
    ///
    /// If the `CREATE DATABASE` fails the record is deleted again, so a returned record
    /// always has a physical schema behind it.
    #[instrument(skip(self, request), fields(name = %request.name, server_id = %abbrev_uuid(&request.server_id)), err)]
    pub async fn create(&self, request: CreateDatabase) -> Result<DatabaseDBResponse> {
        validate_identifier("Database name", &request.name, MAX_IDENTIFIER_LEN)?;

        let server = self.registry.resolve(request.server_id).await?;
        let credentials = server.admin_credentials()?;

        if self.find(server.id, &request.name).await?.is_some() {
            return Err(already_exists(&request.name, &server));
        }

        let database = self
            .databases
            .create(&DatabaseCreateDBRequest {
                server_id: server.id,
                name: request.name.clone(),
                connection_limit: request.connection_limit,
            })
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => already_exists(&request.name, &server),
                other => other.into(),
            })?;

        if let Err(e) = self
            .connector
            .execute(&credentials, &statements::create_database(&database.name))
            .await
        {
            // Compensating delete keeps store and server in step
            if let Err(delete_err) = self.databases.delete(database.id).await {
                error!(
                    "Failed to delete record for database {} after create failed: {}",
                    database.name, delete_err
                );
            }
            return Err(Error::physical(format!("create database {}", database.name), e));
        }

        info!("Created database {} on server {}", database.name, server.name);
        self.events.publish(LifecycleEvent::DatabaseCreated(database.clone()));
        Ok(database)
    }

    /// Drop the database on its server, then delete the record.
    ///
    /// A failed `DROP DATABASE` leaves the record in place. Users still granted the database
    /// are revoked by the sweep that reacts to the published removal.
    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    pub async fn remove(&self, id: DatabaseId) -> Result<DatabaseDBResponse> {
        let database = self.resolve(id).await?;
        let server = self.registry.resolve(database.server_id).await?;
        let credentials = server.admin_credentials()?;

        self.connector
            .execute(&credentials, &statements::drop_database(&database.name))
            .await
            .map_err(|e| Error::physical(format!("drop database {}", database.name), e))?;

        if !self.databases.delete(database.id).await? {
            warn!("Database record {} vanished during removal", abbrev_uuid(&database.id));
        }

        info!("Removed database {} from server {}", database.name, server.name);
        self.events.publish(LifecycleEvent::DatabaseRemoved(database.clone()));
        Ok(database)
    }

    /// Change the recorded connection limit; `None` clears it. Nothing runs on the server.
    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    pub async fn set_connection_limit(&self, id: DatabaseId, limit: Option<u32>) -> Result<DatabaseDBResponse> {
        self.resolve(id).await?;
        let request = DatabaseUpdateDBRequest {
            connection_limit: Some(limit),
        };
        Ok(self.databases.update(id, &request).await?)
    }

    pub async fn resolve(&self, id: DatabaseId) -> Result<DatabaseDBResponse> {
        self.databases
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Database, id))
    }

    pub async fn find(&self, server_id: ServerId, name: &str) -> Result<Option<DatabaseDBResponse>> {
        let filter = DatabaseFilter::named(server_id, name);
        Ok(self.databases.list(&filter).await?.into_iter().next())
    }

    /// Total table size in MiB, from `information_schema.TABLES`
    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    pub async fn stats(&self, id: DatabaseId) -> Result<Vec<QueryRow>> {
        self.diagnostics(id, "read stats for", statements::database_stats).await
    }

    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    pub async fn tables(&self, id: DatabaseId) -> Result<Vec<QueryRow>> {
        self.diagnostics(id, "list tables of", statements::database_tables).await
    }

    /// Sessions currently connected to the database
    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    pub async fn connections(&self, id: DatabaseId) -> Result<Vec<QueryRow>> {
        self.diagnostics(id, "count connections to", statements::database_connections)
            .await
    }

    async fn diagnostics(&self, id: DatabaseId, action: &str, query: fn(&str) -> String) -> Result<Vec<QueryRow>> {
        let database = self.resolve(id).await?;
        let server = self.registry.resolve(database.server_id).await?;
        let credentials = server.admin_credentials()?;
        self.connector
            .query(&credentials, &query(&database.name))
            .await
            .map_err(|e| Error::physical(format!("{action} database {}", database.name), e))
    }
}

fn already_exists(name: &str, server: &ServerDBResponse) -> Error {
    Error::Conflict {
        message: format!("Database {name} already exists on server {}", server.name),
    }
}
