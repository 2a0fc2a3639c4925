//! End-to-end tests through the HTTP surface, over in-memory stores and recording fakes.


use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::api::models::databases::{DatabaseResponse, DiagnosticsResponse};
use crate::api::models::provisions::{PackResponse, ProvisionResponse};
use crate::api::models::servers::{ServerDiagnosticsResponse, ServerResponse};
use crate::api::models::users::UserResponse;
use crate::cluster::WorkloadStatus;
use crate::test_utils::create_test_app;

#[test_log::test(tokio::test)]
async fn test_provision_pack_deprovision_flow() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", Some("eu")).await;

    let response = app.post("/api/v1/provisions").json(&json!({ "zone": "eu" })).await;
    response.assert_status(StatusCode::CREATED);
    let provision: ProvisionResponse = response.json();
    assert_eq!(provision.server_id, server.id);

    let response = app.get(&format!("/api/v1/provisions/{}/pack", provision.id)).await;
    response.assert_status_ok();
    let pack: PackResponse = response.json();
    assert_eq!(pack.host, "alpha.db.internal");
    assert_eq!(pack.port, 3306);
    assert_eq!(
        pack.uri,
        format!("mysql://{}:{}@alpha.db.internal:3306/{}", pack.username, pack.password, pack.database)
    );
    assert_eq!(pack.env["MYSQL_URI"], pack.uri);

    app.delete(&format!("/api/v1/provisions/{}", provision.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/v1/provisions/{}", provision.id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "PROVISION_NOT_FOUND");
    assert_eq!(body["id"], provision.id.to_string());
}

#[tokio::test]
async fn test_provision_without_body_uses_defaults() {
    let (app, h) = create_test_app();
    h.ready_server("alpha", None).await;

    let response = app.post("/api/v1/provisions").await;
    response.assert_status(StatusCode::CREATED);
    let provision: ProvisionResponse = response.json();

    let database = h.databases.resolve(provision.database_id).await.unwrap();
    assert!(database.name.starts_with("provision_"));
}

#[tokio::test]
async fn test_provision_with_no_servers() {
    let (app, _h) = create_test_app();
    let response = app.post("/api/v1/provisions").json(&json!({})).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NO_AVAILABLE_SERVER_FOUND");
}

#[tokio::test]
async fn test_physical_failure_hides_driver_error() {
    let (app, h) = create_test_app();
    h.ready_server("alpha", None).await;
    h.connector.fail_on("CREATE DATABASE");

    let response = app.post("/api/v1/provisions").json(&json!({})).await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["code"], "PHYSICAL_EXECUTION_FAILED");
    assert!(!body["message"].as_str().unwrap().contains("injected"));
}

#[tokio::test]
async fn test_database_and_user_endpoints() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", None).await;

    let response = app
        .post("/api/v1/databases")
        .json(&json!({ "server_id": server.id, "name": "orders" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let orders: DatabaseResponse = response.json();

    let response = app
        .post("/api/v1/users")
        .json(&json!({ "server_id": server.id, "username": "alice" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let alice: UserResponse = response.json();
    assert!(alice.databases.is_empty());
    assert!(!response.text().contains("password"));

    let response = app
        .post(&format!("/api/v1/users/{}/grants/{}", alice.id, orders.id))
        .await;
    response.assert_status_ok();
    let granted: UserResponse = response.json();
    assert_eq!(granted.databases, vec![orders.id]);

    let response = app
        .delete(&format!("/api/v1/users/{}/grants/{}", alice.id, orders.id))
        .await;
    response.assert_status_ok();
    let revoked: UserResponse = response.json();
    assert!(revoked.databases.is_empty());

    app.delete(&format!("/api/v1/users/{}", alice.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.delete(&format!("/api/v1/databases/{}", orders.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.get(&format!("/api/v1/databases/{}", orders.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_database_conflicts() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", None).await;
    h.database(&server, "orders").await;

    let response = app
        .post("/api/v1/databases")
        .json(&json!({ "server_id": server.id, "name": "orders" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cross_server_grant_rejected() {
    let (app, h) = create_test_app();
    let alpha = h.ready_server("alpha", None).await;
    let beta = h.ready_server("beta", None).await;
    let orders = h.database(&alpha, "orders").await;
    let bob = h.user(&beta, "bob", &[]).await;

    let response = app.post(&format!("/api/v1/users/{}/grants/{}", bob.id, orders.id)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_diagnostics_endpoint() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", None).await;
    let orders = h.database(&server, "orders").await;
    let mut row = serde_json::Map::new();
    row.insert("size_mb".to_string(), json!(1.5));
    h.connector.respond_with("SUM(data_length", vec![row.clone()]);

    let response = app.get(&format!("/api/v1/databases/{}/stats", orders.id)).await;
    response.assert_status_ok();
    let stats: DiagnosticsResponse = response.json();
    assert_eq!(stats.database_id, orders.id);
    assert_eq!(stats.rows, vec![row]);
}

#[tokio::test]
async fn test_server_diagnostic_endpoints() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", None).await;
    let mut status = serde_json::Map::new();
    status.insert("Variable_name".to_string(), json!("Slow_queries"));
    status.insert("Value".to_string(), json!("3"));
    h.connector.respond_with("LIKE '%slow%'", vec![status.clone()]);
    let mut account = serde_json::Map::new();
    account.insert("host".to_string(), json!("%"));
    account.insert("user".to_string(), json!("alice"));
    h.connector.respond_with("mysql.user", vec![account.clone()]);

    let response = app.get(&format!("/api/v1/servers/{}/status", server.id)).await;
    response.assert_status_ok();
    let body: ServerDiagnosticsResponse = response.json();
    assert_eq!(body.server_id, server.id);
    assert_eq!(body.rows, vec![status]);

    let response = app.get(&format!("/api/v1/servers/{}/users", server.id)).await;
    response.assert_status_ok();
    let body: ServerDiagnosticsResponse = response.json();
    assert_eq!(body.rows, vec![account]);

    let response = app.get(&format!("/api/v1/servers/{}/databases", server.id)).await;
    response.assert_status_ok();
    let body: ServerDiagnosticsResponse = response.json();
    assert!(body.rows.is_empty());
}

#[tokio::test]
async fn test_delete_server_with_databases_conflicts() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", None).await;
    let orders = h.database(&server, "orders").await;

    let response = app.delete(&format!("/api/v1/servers/{}", server.id)).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "CONFLICT");

    app.delete(&format!("/api/v1/databases/{}", orders.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.delete(&format!("/api/v1/servers/{}", server.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_patch_database_connection_limit() {
    let (app, h) = create_test_app();
    let server = h.ready_server("alpha", None).await;
    let orders = h.database(&server, "orders").await;

    let response = app
        .patch(&format!("/api/v1/databases/{}", orders.id))
        .json(&json!({ "connection_limit": 25 }))
        .await;
    response.assert_status_ok();
    let updated: DatabaseResponse = response.json();
    assert_eq!(updated.connection_limit, Some(25));
}

#[tokio::test]
async fn test_server_create_then_ready() {
    let (app, h) = create_test_app();

    let response = app
        .post("/api/v1/servers")
        .json(&json!({ "cluster_id": "cloud1", "zone": "eu" }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let server: ServerResponse = response.json();
    assert!(!server.ready);
    assert!(!response.text().contains(h.registry.resolve(server.id).await.unwrap().password.as_str()));

    h.cluster.set_status(
        &server.name,
        WorkloadStatus {
            uid: Some("uid-1".to_string()),
            ready: true,
        },
    );
    h.fleet.refresh_workloads().await.unwrap();

    let response = app.get("/api/v1/servers?ready=true").await;
    response.assert_status_ok();
    let servers: Vec<ServerResponse> = response.json();
    assert_eq!(servers.len(), 1);
    assert_eq!(
        servers[0].endpoint.as_ref().unwrap().hostname,
        format!("{}.mysql.svc.cluster.test", server.name)
    );

    app.delete(&format!("/api/v1/servers/{}", server.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.get(&format!("/api/v1/servers/{}", server.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_server() {
    let (app, _h) = create_test_app();
    let response = app
        .post("/api/v1/servers/register")
        .json(&json!({
            "name": "legacy",
            "hostname": "10.0.0.5",
            "username": "admin",
            "password": "adminpass",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let server: ServerResponse = response.json();
    assert!(server.ready);
    assert_eq!(server.endpoint.unwrap().port, 3306);
}

#[tokio::test]
async fn test_unknown_cluster_is_not_found() {
    let (app, _h) = create_test_app();
    let response = app.post("/api/v1/servers").json(&json!({ "cluster_id": "nowhere" })).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "CLUSTER_NOT_FOUND");
}

#[tokio::test]
async fn test_healthz() {
    let (app, _h) = create_test_app();
    let response = app.get("/healthz").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}
