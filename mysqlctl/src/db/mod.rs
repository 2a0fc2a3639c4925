//! Record store for servers, databases, users and provisions.
//!
//! ```text
//! ┌──────────────────┐
//! │ Lifecycle layer  │  (registry, managers, orchestrator)
//! └────────┬─────────┘
//!          │ Arc<dyn Repository>
//!          ↓
//! ┌──────────────────┐
//! │   Repositories   │  (db::handlers - in-memory or PostgreSQL)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │      Models      │  (db::models - record structures)
//! └──────────────────┘
//! ```
//!
//! # Migrations
//!
//! PostgreSQL migrations live in `migrations/` and are embedded with [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
