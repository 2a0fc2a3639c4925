//! API request/response models for provisions.

use std::collections::BTreeMap;

use crate::db::models::provisions::ProvisionDBResponse;
use crate::lifecycle::{ConnectionBundle, ProvisionRequest};
use crate::types::{DatabaseId, DbUserId, ProvisionId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for provisioning a database/user pair. Both fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionCreate {
    /// Preferred zone; any zone is used when it has no ready server
    pub zone: Option<String>,
    pub prefix: Option<String>,
}

impl From<ProvisionCreate> for ProvisionRequest {
    fn from(create: ProvisionCreate) -> Self {
        Self {
            zone: create.zone,
            prefix: create.prefix,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub id: ProvisionId,
    pub server_id: ServerId,
    pub database_id: DatabaseId,
    pub user_id: DbUserId,
    pub created_at: DateTime<Utc>,
}

impl From<ProvisionDBResponse> for ProvisionResponse {
    fn from(db: ProvisionDBResponse) -> Self {
        Self {
            id: db.id,
            server_id: db.server_id,
            database_id: db.database_id,
            user_id: db.user_id,
            created_at: db.created_at,
        }
    }
}

/// Connection bundle for a provision, also spelled out as `MYSQL_*` variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackResponse {
    pub provision_id: ProvisionId,
    pub username: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub uri: String,
    pub env: BTreeMap<String, String>,
}

impl PackResponse {
    pub fn new(provision_id: ProvisionId, bundle: ConnectionBundle) -> Self {
        let env = bundle
            .to_env()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        Self {
            provision_id,
            username: bundle.username,
            password: bundle.password,
            database: bundle.database,
            host: bundle.host,
            port: bundle.port,
            uri: bundle.uri,
            env,
        }
    }
}
