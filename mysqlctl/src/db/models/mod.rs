//! Record structures and request types for each store table.
//!
//! Each submodule follows the same naming: `<Entity>CreateDBRequest`,
//! `<Entity>UpdateDBRequest`, `<Entity>DBResponse` and `<Entity>Filter`.

pub mod databases;
pub mod provisions;
pub mod servers;
pub mod users;
