//! API request and response data models.
//!
//! API models are distinct from the record types in [`crate::db::models`]: responses leave
//! out admin and tenant passwords, and requests carry only what a caller may choose.

pub mod databases;
pub mod provisions;
pub mod servers;
pub mod users;
