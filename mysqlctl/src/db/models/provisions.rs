//! Database models for provisions: one leased server + database + user triple.

use crate::types::{DatabaseId, DbUserId, ProvisionId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database request for creating a new provision record
#[derive(Debug, Clone)]
pub struct ProvisionCreateDBRequest {
    pub server_id: ServerId,
    pub database_id: DatabaseId,
    pub user_id: DbUserId,
}

/// Provisions are immutable bindings; the update request carries nothing.
#[derive(Debug, Clone, Default)]
pub struct ProvisionUpdateDBRequest {}

/// Database response for a provision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionDBResponse {
    pub id: ProvisionId,
    pub server_id: ServerId,
    pub database_id: DatabaseId,
    pub user_id: DbUserId,
    pub created_at: DateTime<Utc>,
}

/// Filter for listing provisions
#[derive(Debug, Clone, Default)]
pub struct ProvisionFilter {
    pub server_id: Option<ServerId>,
    pub database_id: Option<DatabaseId>,
    pub user_id: Option<DbUserId>,
}

impl ProvisionFilter {
    pub fn matches(&self, provision: &ProvisionDBResponse) -> bool {
        self.server_id.is_none_or(|id| id == provision.server_id)
            && self.database_id.is_none_or(|id| id == provision.database_id)
            && self.user_id.is_none_or(|id| id == provision.user_id)
    }
}
