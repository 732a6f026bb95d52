use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::dtos::directory::{
    CreateManagerRequest, ManagerResponse, ManagerSummaryResponse, UpdateManagerRequest,
};
use crate::dtos::ListQuery;
use crate::services::Page;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_manager(
    State(state): State<AppState>,
    Json(request): Json<CreateManagerRequest>,
) -> Result<(StatusCode, Json<ManagerResponse>), AppError> {
    request.validate()?;
    let manager = state.service.create_manager(&request).await?;
    Ok((StatusCode::CREATED, Json(manager.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_manager(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ManagerResponse>, AppError> {
    Ok(Json(state.service.get_manager(&id).await?.into()))
}

/// Managers with their agents' summed targets and achievements.
#[tracing::instrument(skip(state))]
pub async fn list_managers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ManagerSummaryResponse>>, AppError> {
    let summaries = state
        .service
        .list_managers_with_totals(Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(
        summaries
            .into_iter()
            .map(ManagerSummaryResponse::from)
            .collect(),
    ))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_manager(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateManagerRequest>,
) -> Result<Json<ManagerResponse>, AppError> {
    request.validate()?;
    Ok(Json(state.service.update_manager(&id, &request).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_manager(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_manager(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
