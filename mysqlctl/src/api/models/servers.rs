//! API request/response models for managed servers.

use crate::db::models::servers::{Endpoint, ServerDBResponse, ServerFilter};
use crate::lifecycle::{ProvisionServer, RegisterServer};
use crate::types::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for creating a cluster-hosted server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCreate {
    pub cluster_id: String,
    /// Defaults to the configured namespace
    pub namespace: Option<String>,
    pub zone: Option<String>,
}

impl From<ServerCreate> for ProvisionServer {
    fn from(create: ServerCreate) -> Self {
        Self {
            cluster_id: create.cluster_id,
            namespace: create.namespace,
            zone: create.zone,
        }
    }
}

/// Request body for registering a server that is already running somewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRegister {
    pub name: String,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub zone: Option<String>,
}

fn default_port() -> u16 {
    3306
}

impl From<ServerRegister> for RegisterServer {
    fn from(register: ServerRegister) -> Self {
        Self {
            name: register.name,
            hostname: register.hostname,
            port: register.port,
            username: register.username,
            password: register.password,
            zone: register.zone,
        }
    }
}

/// Query parameters for listing servers
#[derive(Debug, Default, Deserialize)]
pub struct ListServersQuery {
    pub zone: Option<String>,
    pub cluster_id: Option<String>,
    pub ready: Option<bool>,
}

impl From<ListServersQuery> for ServerFilter {
    fn from(query: ListServersQuery) -> Self {
        Self {
            zone: query.zone,
            cluster_id: query.cluster_id,
            ready: query.ready,
            ..Default::default()
        }
    }
}

/// Server details returned by the API. Admin credentials are not included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerResponse {
    pub id: ServerId,
    pub name: String,
    pub cluster_id: Option<String>,
    pub namespace: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub ready: bool,
    pub zone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServerDBResponse> for ServerResponse {
    fn from(db: ServerDBResponse) -> Self {
        Self {
            ready: db.is_ready(),
            id: db.id,
            name: db.name,
            cluster_id: db.cluster_id,
            namespace: db.namespace,
            endpoint: db.endpoint,
            zone: db.zone,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Rows of a server-level diagnostic query, passed through as returned by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDiagnosticsResponse {
    pub server_id: ServerId,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}
