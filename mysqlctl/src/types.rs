//! Common type definitions.
//!
//! # ID Types
//!
//! All record IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`ServerId`]: MySQL server record identifier
//! - [`DatabaseId`]: Database record identifier
//! - [`DbUserId`]: Database user record identifier
//! - [`ProvisionId`]: Provision (lease) identifier
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type ServerId = Uuid;
pub type DatabaseId = Uuid;
pub type DbUserId = Uuid;
pub type ProvisionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Kinds of records managed by the control layer, used when reporting missing entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Server,
    Database,
    User,
    Provision,
    Cluster,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Server => write!(f, "Server"),
            Resource::Database => write!(f, "Database"),
            Resource::User => write!(f, "User"),
            Resource::Provision => write!(f, "Provision"),
            Resource::Cluster => write!(f, "Cluster"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id: Uuid = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
