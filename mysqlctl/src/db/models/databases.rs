//! Database models for MySQL databases (schemas) hosted on a server.

use crate::types::{DatabaseId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database request for creating a new database record
#[derive(Debug, Clone)]
pub struct DatabaseCreateDBRequest {
    pub server_id: ServerId,
    pub name: String,
    pub connection_limit: Option<u32>,
}

/// Database request for updating a database record
#[derive(Debug, Clone, Default)]
pub struct DatabaseUpdateDBRequest {
    pub connection_limit: Option<Option<u32>>,
}

/// Database response for a database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDBResponse {
    pub id: DatabaseId,
    pub server_id: ServerId,
    /// Unique within `server_id`
    pub name: String,
    pub connection_limit: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing databases
#[derive(Debug, Clone, Default)]
pub struct DatabaseFilter {
    pub server_id: Option<ServerId>,
    pub name: Option<String>,
}

impl DatabaseFilter {
    pub fn named(server_id: ServerId, name: &str) -> Self {
        Self {
            server_id: Some(server_id),
            name: Some(name.to_string()),
        }
    }

    pub fn matches(&self, database: &DatabaseDBResponse) -> bool {
        self.server_id.is_none_or(|id| id == database.server_id) && self.name.as_ref().is_none_or(|n| n == &database.name)
    }
}
