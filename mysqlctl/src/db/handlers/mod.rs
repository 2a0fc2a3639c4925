//! Repository implementations for record access.
//!
//! This module provides one repository per record type, each implementing the
//! [`Repository`] trait, in two flavours:
//!
//! - [`in_memory`]: insertion-ordered stores behind a lock (tests, single process)
//! - [`Servers`], [`Databases`], [`Users`], [`Provisions`]: PostgreSQL-backed stores
//!
//! Lifecycle managers never see the concrete type; they hold the `Arc<dyn Repository>`
//! aliases from [`repository`] bundled in [`Stores`].

pub mod databases;
pub mod in_memory;
pub mod provisions;
pub mod repository;
pub mod servers;
pub mod users;

use std::sync::Arc;

use sqlx::PgPool;

pub use databases::Databases;
pub use provisions::Provisions;
pub use repository::{DatabaseStore, ProvisionStore, Repository, ServerStore, Stores, UserStore};
pub use servers::Servers;
pub use users::Users;

/// PostgreSQL-backed stores sharing one pool
pub fn postgres_stores(pool: PgPool) -> Stores {
    Stores {
        servers: Arc::new(Servers::new(pool.clone())),
        databases: Arc::new(Databases::new(pool.clone())),
        users: Arc::new(Users::new(pool.clone())),
        provisions: Arc::new(Provisions::new(pool)),
    }
}
