use crate::AppState;
use crate::api::models::servers::{ListServersQuery, ServerCreate, ServerDiagnosticsResponse, ServerRegister, ServerResponse};
use crate::errors::Result;
use crate::types::ServerId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[tracing::instrument(skip_all)]
pub async fn list_servers(
    State(state): State<AppState>,
    Query(query): Query<ListServersQuery>,
) -> Result<Json<Vec<ServerResponse>>> {
    let servers = state.registry.list(&query.into()).await?;
    Ok(Json(servers.into_iter().map(Into::into).collect()))
}

#[tracing::instrument(skip_all)]
pub async fn get_server(State(state): State<AppState>, Path(id): Path<ServerId>) -> Result<Json<ServerResponse>> {
    let server = state.registry.resolve(id).await?;
    Ok(Json(server.into()))
}

/// Create a server in a cluster. It is returned with no endpoint; it becomes selectable once
/// its workload reports ready.
#[tracing::instrument(skip_all)]
pub async fn create_server(
    State(state): State<AppState>,
    Json(create): Json<ServerCreate>,
) -> Result<(StatusCode, Json<ServerResponse>)> {
    let server = state.fleet.provision_server(create.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(server.into())))
}

#[tracing::instrument(skip_all)]
pub async fn register_server(
    State(state): State<AppState>,
    Json(register): Json<ServerRegister>,
) -> Result<(StatusCode, Json<ServerResponse>)> {
    let server = state.registry.register(register.into()).await?;
    Ok((StatusCode::CREATED, Json(server.into())))
}

#[tracing::instrument(skip_all)]
pub async fn delete_server(State(state): State<AppState>, Path(id): Path<ServerId>) -> Result<StatusCode> {
    state.fleet.deprovision_server(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub async fn server_users(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
) -> Result<Json<ServerDiagnosticsResponse>> {
    let rows = state.fleet.server_users(id).await?;
    Ok(Json(ServerDiagnosticsResponse { server_id: id, rows }))
}

#[tracing::instrument(skip_all)]
pub async fn server_databases(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
) -> Result<Json<ServerDiagnosticsResponse>> {
    let rows = state.fleet.server_databases(id).await?;
    Ok(Json(ServerDiagnosticsResponse { server_id: id, rows }))
}

#[tracing::instrument(skip_all)]
pub async fn server_status(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
) -> Result<Json<ServerDiagnosticsResponse>> {
    let rows = state.fleet.server_status(id).await?;
    Ok(Json(ServerDiagnosticsResponse { server_id: id, rows }))
}
