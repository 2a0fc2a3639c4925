//! Database models for MySQL user accounts.

use crate::types::{DatabaseId, DbUserId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database request for creating a new user record
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub server_id: ServerId,
    pub username: String,
    pub password: String,
    pub databases: Vec<DatabaseId>,
}

/// Database request for updating a user record.
///
/// The authorization list is edited one id at a time, applied by the store against the
/// current row, so concurrent grants and revokes on one user do not overwrite each other.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    /// Added to the authorization list unless already present
    pub add_database: Option<DatabaseId>,
    /// Removed from the authorization list
    pub remove_database: Option<DatabaseId>,
}

impl UserUpdateDBRequest {
    pub fn add(database_id: DatabaseId) -> Self {
        Self {
            add_database: Some(database_id),
            remove_database: None,
        }
    }

    pub fn remove(database_id: DatabaseId) -> Self {
        Self {
            add_database: None,
            remove_database: Some(database_id),
        }
    }
}

/// Database response for a user
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDBResponse {
    pub id: DbUserId,
    pub server_id: ServerId,
    /// Unique within `server_id`
    pub username: String,
    pub password: String,
    /// Authorization list: databases this user has been granted access to
    pub databases: Vec<DatabaseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserDBResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDBResponse")
            .field("id", &self.id)
            .field("server_id", &self.server_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("databases", &self.databases)
            .finish()
    }
}

impl UserDBResponse {
    pub fn has_access_to(&self, database_id: DatabaseId) -> bool {
        self.databases.contains(&database_id)
    }
}

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub server_id: Option<ServerId>,
    pub username: Option<String>,
    /// Users whose authorization list contains this database
    pub database_id: Option<DatabaseId>,
}

impl UserFilter {
    pub fn named(server_id: ServerId, username: &str) -> Self {
        Self {
            server_id: Some(server_id),
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    pub fn with_access_to(database_id: DatabaseId) -> Self {
        Self {
            database_id: Some(database_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, user: &UserDBResponse) -> bool {
        self.server_id.is_none_or(|id| id == user.server_id)
            && self.username.as_ref().is_none_or(|n| n == &user.username)
            && self.database_id.is_none_or(|id| user.has_access_to(id))
    }
}
