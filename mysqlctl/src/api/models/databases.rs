//! API request/response models for databases.

use crate::db::models::databases::DatabaseDBResponse;
use crate::lifecycle::CreateDatabase;
use crate::types::{DatabaseId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseCreate {
    pub server_id: ServerId,
    pub name: String,
    pub connection_limit: Option<u32>,
}

impl From<DatabaseCreate> for CreateDatabase {
    fn from(create: DatabaseCreate) -> Self {
        Self {
            server_id: create.server_id,
            name: create.name,
            connection_limit: create.connection_limit,
        }
    }
}

/// Replaces the recorded connection limit; `null` clears it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseUpdate {
    pub connection_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseResponse {
    pub id: DatabaseId,
    pub server_id: ServerId,
    pub name: String,
    pub connection_limit: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DatabaseDBResponse> for DatabaseResponse {
    fn from(db: DatabaseDBResponse) -> Self {
        Self {
            id: db.id,
            server_id: db.server_id,
            name: db.name,
            connection_limit: db.connection_limit,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Rows of a diagnostic query, passed through as returned by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsResponse {
    pub database_id: DatabaseId,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}
