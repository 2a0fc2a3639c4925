//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Provisions** (`/api/v1/provisions/*`): Provision, pack and deprovision database/user pairs
//! - **Servers** (`/api/v1/servers/*`): Cluster-hosted and externally registered servers
//! - **Databases** (`/api/v1/databases/*`): Database lifecycle and diagnostics
//! - **Users** (`/api/v1/users/*`): User lifecycle and grants
//!
//! Record types that carry credentials are never returned as-is; only a pack response
//! includes a password.

pub mod handlers;
pub mod models;
