//! Base repository trait for record store operations.

use std::sync::Arc;

/// Contains the Repository trait.
///
/// A repository is the data access layer for one record type. It provides methods for
/// creating, reading, updating, and deleting records, as well as listing them with simple
/// filters. Lists are returned in registration (creation) order.
use crate::db::errors::Result;
use crate::db::models::{
    databases::{DatabaseCreateDBRequest, DatabaseDBResponse, DatabaseFilter, DatabaseUpdateDBRequest},
    provisions::{ProvisionCreateDBRequest, ProvisionDBResponse, ProvisionFilter, ProvisionUpdateDBRequest},
    servers::{ServerCreateDBRequest, ServerDBResponse, ServerFilter, ServerUpdateDBRequest},
    users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
};
use crate::types::{DatabaseId, DbUserId, ProvisionId, ServerId};

/// Base repository trait providing common record operations
///
/// This trait has separate associated types for create requests, update requests, and responses.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// The request type for creating entities
    type CreateRequest: Send + Sync;

    /// The request type for updating entities
    type UpdateRequest: Send + Sync;

    /// The response/DTO type returned by operations
    type Response: Send;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities matching the filter
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Delete an entity by ID
    async fn delete(&self, id: Self::Id) -> Result<bool>;

    /// Update an entity by ID
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}

pub type ServerStore = Arc<
    dyn Repository<
            CreateRequest = ServerCreateDBRequest,
            UpdateRequest = ServerUpdateDBRequest,
            Response = ServerDBResponse,
            Id = ServerId,
            Filter = ServerFilter,
        >,
>;

pub type DatabaseStore = Arc<
    dyn Repository<
            CreateRequest = DatabaseCreateDBRequest,
            UpdateRequest = DatabaseUpdateDBRequest,
            Response = DatabaseDBResponse,
            Id = DatabaseId,
            Filter = DatabaseFilter,
        >,
>;

pub type UserStore = Arc<
    dyn Repository<
            CreateRequest = UserCreateDBRequest,
            UpdateRequest = UserUpdateDBRequest,
            Response = UserDBResponse,
            Id = DbUserId,
            Filter = UserFilter,
        >,
>;

pub type ProvisionStore = Arc<
    dyn Repository<
            CreateRequest = ProvisionCreateDBRequest,
            UpdateRequest = ProvisionUpdateDBRequest,
            Response = ProvisionDBResponse,
            Id = ProvisionId,
            Filter = ProvisionFilter,
        >,
>;

/// The four record stores the lifecycle managers operate on
#[derive(Clone)]
pub struct Stores {
    pub servers: ServerStore,
    pub databases: DatabaseStore,
    pub users: UserStore,
    pub provisions: ProvisionStore,
}
