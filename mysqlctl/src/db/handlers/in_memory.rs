//! In-memory record store.
//!
//! Records are kept in insertion order behind a `parking_lot` lock. It's suitable for
//! testing and single-process deployments. Records are lost on restart.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::repository::{Repository, Stores};
use crate::db::errors::{DbError, Result};
use crate::db::models::{
    databases::{DatabaseCreateDBRequest, DatabaseDBResponse, DatabaseFilter, DatabaseUpdateDBRequest},
    provisions::{ProvisionCreateDBRequest, ProvisionDBResponse, ProvisionFilter, ProvisionUpdateDBRequest},
    servers::{ServerCreateDBRequest, ServerDBResponse, ServerFilter, ServerUpdateDBRequest},
    users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
};

/// How a record type is created, updated, filtered and kept unique in memory.
pub trait MemoryRecord: Clone + Send + Sync + 'static {
    type CreateRequest: Send + Sync;
    type UpdateRequest: Send + Sync;
    type Filter: Send + Sync;

    const TABLE: &'static str;

    fn from_create(request: &Self::CreateRequest) -> Self;
    fn id(&self) -> Uuid;
    fn apply(&mut self, request: &Self::UpdateRequest);
    fn matches(&self, filter: &Self::Filter) -> bool;

    /// Name of the unique constraint `self` and `other` would violate together, if any
    fn conflicts_with(&self, _other: &Self) -> Option<&'static str> {
        None
    }
}

pub struct InMemory<T> {
    rows: Arc<RwLock<Vec<T>>>,
}

impl<T> InMemory<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T> Default for InMemory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemory<T> {
    fn clone(&self) -> Self {
        Self { rows: self.rows.clone() }
    }
}

fn unique_violation<T: MemoryRecord>(constraint: &'static str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some(T::TABLE.to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

#[async_trait::async_trait]
impl<T: MemoryRecord> Repository for InMemory<T> {
    type CreateRequest = T::CreateRequest;
    type UpdateRequest = T::UpdateRequest;
    type Response = T;
    type Id = Uuid;
    type Filter = T::Filter;

    async fn create(&self, request: &Self::CreateRequest) -> Result<T> {
        let record = T::from_create(request);
        let mut rows = self.rows.write();
        if let Some(constraint) = rows.iter().find_map(|existing| record.conflicts_with(existing)) {
            return Err(unique_violation::<T>(constraint));
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>> {
        Ok(self.rows.read().iter().find(|r| r.id() == id).cloned())
    }

    async fn list(&self, filter: &Self::Filter) -> Result<Vec<T>> {
        Ok(self.rows.read().iter().filter(|r| r.matches(filter)).cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        Ok(rows.len() != before)
    }

    async fn update(&self, id: Uuid, request: &Self::UpdateRequest) -> Result<T> {
        let mut rows = self.rows.write();
        let record = rows.iter_mut().find(|r| r.id() == id).ok_or(DbError::NotFound)?;
        record.apply(request);
        Ok(record.clone())
    }
}

impl MemoryRecord for ServerDBResponse {
    type CreateRequest = ServerCreateDBRequest;
    type UpdateRequest = ServerUpdateDBRequest;
    type Filter = ServerFilter;

    const TABLE: &'static str = "mysql_servers";

    fn from_create(request: &ServerCreateDBRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            cluster_id: request.cluster_id.clone(),
            namespace: request.namespace.clone(),
            endpoint: request.endpoint.clone(),
            username: request.username.clone(),
            password: request.password.clone(),
            zone: request.zone.clone(),
            uid: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, request: &ServerUpdateDBRequest) {
        if let Some(endpoint) = &request.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(uid) = &request.uid {
            self.uid = uid.clone();
        }
        self.updated_at = Utc::now();
    }

    fn matches(&self, filter: &ServerFilter) -> bool {
        filter.matches(self)
    }
}

impl MemoryRecord for DatabaseDBResponse {
    type CreateRequest = DatabaseCreateDBRequest;
    type UpdateRequest = DatabaseUpdateDBRequest;
    type Filter = DatabaseFilter;

    const TABLE: &'static str = "mysql_databases";

    fn from_create(request: &DatabaseCreateDBRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            server_id: request.server_id,
            name: request.name.clone(),
            connection_limit: request.connection_limit,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, request: &DatabaseUpdateDBRequest) {
        if let Some(limit) = request.connection_limit {
            self.connection_limit = limit;
        }
        self.updated_at = Utc::now();
    }

    fn matches(&self, filter: &DatabaseFilter) -> bool {
        filter.matches(self)
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.server_id == other.server_id && self.name == other.name).then_some("mysql_databases_server_id_name_key")
    }
}

impl MemoryRecord for UserDBResponse {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Filter = UserFilter;

    const TABLE: &'static str = "mysql_users";

    fn from_create(request: &UserCreateDBRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            server_id: request.server_id,
            username: request.username.clone(),
            password: request.password.clone(),
            databases: request.databases.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, request: &UserUpdateDBRequest) {
        if let Some(id) = request.remove_database {
            self.databases.retain(|d| *d != id);
        }
        if let Some(id) = request.add_database
            && !self.databases.contains(&id)
        {
            self.databases.push(id);
        }
        self.updated_at = Utc::now();
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        filter.matches(self)
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.server_id == other.server_id && self.username == other.username).then_some("mysql_users_server_id_username_key")
    }
}

impl MemoryRecord for ProvisionDBResponse {
    type CreateRequest = ProvisionCreateDBRequest;
    type UpdateRequest = ProvisionUpdateDBRequest;
    type Filter = ProvisionFilter;

    const TABLE: &'static str = "mysql_provisions";

    fn from_create(request: &ProvisionCreateDBRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id: request.server_id,
            database_id: request.database_id,
            user_id: request.user_id,
            created_at: Utc::now(),
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, _request: &ProvisionUpdateDBRequest) {}

    fn matches(&self, filter: &ProvisionFilter) -> bool {
        filter.matches(self)
    }
}

/// Fresh, empty in-memory stores for every record type
pub fn in_memory_stores() -> Stores {
    Stores {
        servers: Arc::new(InMemory::<ServerDBResponse>::new()),
        databases: Arc::new(InMemory::<DatabaseDBResponse>::new()),
        users: Arc::new(InMemory::<UserDBResponse>::new()),
        provisions: Arc::new(InMemory::<ProvisionDBResponse>::new()),
    }
}
