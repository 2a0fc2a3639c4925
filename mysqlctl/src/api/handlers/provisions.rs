use crate::AppState;
use crate::api::models::provisions::{PackResponse, ProvisionCreate, ProvisionResponse};
use crate::errors::Result;
use crate::types::ProvisionId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Provision a database and a user granted to it on one server.
///
/// The body may be empty, in which case any zone and the default prefix are used.
#[tracing::instrument(skip_all)]
pub async fn create_provision(
    State(state): State<AppState>,
    create: Option<Json<ProvisionCreate>>,
) -> Result<(StatusCode, Json<ProvisionResponse>)> {
    let create = create.map(|Json(c)| c).unwrap_or_default();
    let provision = state.orchestrator.provision(create.into()).await?;
    Ok((StatusCode::CREATED, Json(provision.into())))
}

#[tracing::instrument(skip_all)]
pub async fn get_provision(State(state): State<AppState>, Path(id): Path<ProvisionId>) -> Result<Json<ProvisionResponse>> {
    let provision = state.orchestrator.get(id).await?;
    Ok(Json(provision.into()))
}

#[tracing::instrument(skip_all)]
pub async fn pack_provision(State(state): State<AppState>, Path(id): Path<ProvisionId>) -> Result<Json<PackResponse>> {
    let bundle = state.orchestrator.pack(id).await?;
    Ok(Json(PackResponse::new(id, bundle)))
}

#[tracing::instrument(skip_all)]
pub async fn delete_provision(State(state): State<AppState>, Path(id): Path<ProvisionId>) -> Result<StatusCode> {
    state.orchestrator.deprovision(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
