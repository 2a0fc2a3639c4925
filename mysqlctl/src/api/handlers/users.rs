use crate::AppState;
use crate::api::models::users::{UserCreate, UserResponse};
use crate::errors::Result;
use crate::lifecycle::CreateUser;
use crate::names::generate_password;
use crate::types::{DatabaseId, DbUserId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let password = create
        .password
        .unwrap_or_else(|| generate_password(state.config.provisioning.user_password_length));
    let user = state
        .users
        .create(CreateUser {
            server_id: create.server_id,
            username: create.username,
            password,
            databases: create.databases,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[tracing::instrument(skip_all)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<DbUserId>) -> Result<Json<UserResponse>> {
    let user = state.users.resolve(id).await?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip_all)]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<DbUserId>) -> Result<StatusCode> {
    state.users.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub async fn grant_database(
    State(state): State<AppState>,
    Path((user_id, database_id)): Path<(DbUserId, DatabaseId)>,
) -> Result<Json<UserResponse>> {
    let user = state.users.grant(user_id, database_id).await?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip_all)]
pub async fn revoke_database(
    State(state): State<AppState>,
    Path((user_id, database_id)): Path<(DbUserId, DatabaseId)>,
) -> Result<Json<UserResponse>> {
    let user = state.users.revoke(user_id, database_id).await?;
    Ok(Json(user.into()))
}
