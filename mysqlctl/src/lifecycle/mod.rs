//! Lifecycle managers.
//!
//! Each manager keeps a store and the physical side (a MySQL server, a cluster) in step:
//! the record is written first, the physical statement second, and a failed statement
//! undoes the record. [`provisions::ProvisionOrchestrator`] composes the database and
//! user managers into the provision saga.

pub mod databases;
pub mod fleet;
pub mod provisions;
pub mod reactor;
pub mod registry;
pub mod users;

pub use databases::{CreateDatabase, DatabaseLifecycleManager};
pub use fleet::{ProvisionServer, ServerFleetProvisioner, WorkloadReport};
pub use provisions::{ConnectionBundle, ProvisionOrchestrator, ProvisionRequest};
pub use registry::{RegisterServer, ServerRegistry};
pub use users::{CreateUser, UserLifecycleManager};
