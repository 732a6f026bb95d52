use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::dtos::directory::{CreateStandardRequest, StandardResponse, UpdateStandardRequest};
use crate::dtos::ListQuery;
use crate::services::Page;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_standard(
    State(state): State<AppState>,
    Json(request): Json<CreateStandardRequest>,
) -> Result<(StatusCode, Json<StandardResponse>), AppError> {
    request.validate()?;
    let standard = state.service.create_standard(&request).await?;
    Ok((StatusCode::CREATED, Json(standard.into())))
}

pub async fn get_standard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StandardResponse>, AppError> {
    Ok(Json(state.service.get_standard(&id).await?.into()))
}

pub async fn list_standards(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StandardResponse>>, AppError> {
    let standards = state
        .service
        .list_standards(Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(
        standards.into_iter().map(StandardResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_standard(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStandardRequest>,
) -> Result<Json<StandardResponse>, AppError> {
    request.validate()?;
    Ok(Json(state.service.update_standard(&id, &request).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_standard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_standard(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
