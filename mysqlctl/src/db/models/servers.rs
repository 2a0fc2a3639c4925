//! Database models for MySQL servers.

use crate::errors::Error;
use crate::mysql::AdminCredentials;
use crate::types::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host and port a server accepts connections on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub hostname: String,
    pub port: u16,
}

/// Database request for creating a new server record
#[derive(Debug, Clone)]
pub struct ServerCreateDBRequest {
    pub name: String,
    pub cluster_id: Option<String>,
    pub namespace: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub username: String,
    pub password: String,
    pub zone: Option<String>,
}

/// Database request for updating a server record.
///
/// The outer `Option` means "leave unchanged"; the inner one allows clearing a field.
#[derive(Debug, Clone, Default)]
pub struct ServerUpdateDBRequest {
    pub endpoint: Option<Option<Endpoint>>,
    pub uid: Option<Option<String>>,
}

/// Database response for a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDBResponse {
    pub id: ServerId,
    /// Workload name for cluster-hosted servers, free-form label otherwise
    pub name: String,
    pub cluster_id: Option<String>,
    pub namespace: Option<String>,
    /// Populated only once the underlying workload reports ready
    pub endpoint: Option<Endpoint>,
    pub username: String,
    pub password: String,
    pub zone: Option<String>,
    /// Cluster-assigned uid of the deployment, once known
    pub uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServerDBResponse {
    pub fn is_ready(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Administrative credentials for executing statements on this server.
    pub fn admin_credentials(&self) -> Result<AdminCredentials, Error> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| Error::ServerNotReady { id: self.id.to_string() })?;
        Ok(AdminCredentials {
            hostname: endpoint.hostname.clone(),
            port: endpoint.port,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// Filter for listing servers
#[derive(Debug, Clone, Default)]
pub struct ServerFilter {
    pub zone: Option<String>,
    pub cluster_id: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    /// Only servers with a populated endpoint
    pub ready: Option<bool>,
}

impl ServerFilter {
    pub fn ready_in_zone(zone: Option<&str>) -> Self {
        Self {
            zone: zone.map(str::to_string),
            ready: Some(true),
            ..Default::default()
        }
    }

    pub fn workload(cluster_id: &str, namespace: &str, name: &str) -> Self {
        Self {
            cluster_id: Some(cluster_id.to_string()),
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, server: &ServerDBResponse) -> bool {
        fn eq(filter: &Option<String>, value: &Option<String>) -> bool {
            filter.as_ref().is_none_or(|f| value.as_ref() == Some(f))
        }
        eq(&self.zone, &server.zone)
            && eq(&self.cluster_id, &server.cluster_id)
            && eq(&self.namespace, &server.namespace)
            && self.name.as_ref().is_none_or(|n| n == &server.name)
            && self.ready.is_none_or(|ready| ready == server.is_ready())
    }
}
