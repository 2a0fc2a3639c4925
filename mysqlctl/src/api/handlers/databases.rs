use crate::AppState;
use crate::api::models::databases::{DatabaseCreate, DatabaseResponse, DatabaseUpdate, DiagnosticsResponse};
use crate::errors::Result;
use crate::types::DatabaseId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[tracing::instrument(skip_all)]
pub async fn create_database(
    State(state): State<AppState>,
    Json(create): Json<DatabaseCreate>,
) -> Result<(StatusCode, Json<DatabaseResponse>)> {
    let database = state.databases.create(create.into()).await?;
    Ok((StatusCode::CREATED, Json(database.into())))
}

#[tracing::instrument(skip_all)]
pub async fn get_database(State(state): State<AppState>, Path(id): Path<DatabaseId>) -> Result<Json<DatabaseResponse>> {
    let database = state.databases.resolve(id).await?;
    Ok(Json(database.into()))
}

#[tracing::instrument(skip_all)]
pub async fn update_database(
    State(state): State<AppState>,
    Path(id): Path<DatabaseId>,
    Json(update): Json<DatabaseUpdate>,
) -> Result<Json<DatabaseResponse>> {
    let database = state.databases.set_connection_limit(id, update.connection_limit).await?;
    Ok(Json(database.into()))
}

/// Drop a database. Users granted to it are revoked in the background.
#[tracing::instrument(skip_all)]
pub async fn delete_database(State(state): State<AppState>, Path(id): Path<DatabaseId>) -> Result<StatusCode> {
    state.databases.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub async fn database_stats(State(state): State<AppState>, Path(id): Path<DatabaseId>) -> Result<Json<DiagnosticsResponse>> {
    let rows = state.databases.stats(id).await?;
    Ok(Json(DiagnosticsResponse { database_id: id, rows }))
}

#[tracing::instrument(skip_all)]
pub async fn database_tables(State(state): State<AppState>, Path(id): Path<DatabaseId>) -> Result<Json<DiagnosticsResponse>> {
    let rows = state.databases.tables(id).await?;
    Ok(Json(DiagnosticsResponse { database_id: id, rows }))
}

#[tracing::instrument(skip_all)]
pub async fn database_connections(
    State(state): State<AppState>,
    Path(id): Path<DatabaseId>,
) -> Result<Json<DiagnosticsResponse>> {
    let rows = state.databases.connections(id).await?;
    Ok(Json(DiagnosticsResponse { database_id: id, rows }))
}
