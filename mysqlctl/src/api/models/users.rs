//! API request/response models for database users.

use crate::db::models::users::UserDBResponse;
use crate::types::{DatabaseId, DbUserId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub server_id: ServerId,
    pub username: String,
    /// Generated when absent
    pub password: Option<String>,
    /// Databases to grant right away; all must live on `server_id`
    #[serde(default)]
    pub databases: Vec<DatabaseId>,
}

/// User details returned by the API. The password is not included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: DbUserId,
    pub server_id: ServerId,
    pub username: String,
    pub databases: Vec<DatabaseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            server_id: db.server_id,
            username: db.username,
            databases: db.databases,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
