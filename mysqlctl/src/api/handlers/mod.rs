//! HTTP request handlers, organized by resource type.
//!
//! Handlers only translate between API models and the lifecycle managers held in
//! [`crate::AppState`]; every rule about names, servers and grants lives in the managers.

pub mod databases;
pub mod provisions;
pub mod servers;
pub mod users;

use axum::Json;
use serde_json::{Value, json};

/// Liveness check
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
