use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::dtos::certification::{
    CertificationListQuery, CertificationResponse, CreateCertificationRequest,
    UpdateCertificationRequest,
};
use crate::dtos::invoice::ListResponse;
use crate::dtos::WriteResponse;
use crate::services::Page;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_certification(
    State(state): State<AppState>,
    Json(request): Json<CreateCertificationRequest>,
) -> Result<(StatusCode, Json<WriteResponse<CertificationResponse>>), AppError> {
    request.validate()?;
    let outcome = state.service.create_certification(&request).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_certification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CertificationResponse>, AppError> {
    Ok(Json(state.service.get_certification(&id).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn list_certifications(
    State(state): State<AppState>,
    Query(query): Query<CertificationListQuery>,
) -> Result<Json<ListResponse<CertificationResponse>>, AppError> {
    let listing = state
        .service
        .list_certifications(
            query.agent_id.as_deref(),
            Page::new(query.limit, query.offset),
        )
        .await?;
    Ok(Json(ListResponse {
        items: listing
            .items
            .into_iter()
            .map(CertificationResponse::from)
            .collect(),
        total: Some(listing.total),
        limit: listing.page.limit,
        offset: listing.page.offset,
    }))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_certification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCertificationRequest>,
) -> Result<Json<WriteResponse<CertificationResponse>>, AppError> {
    request.validate()?;
    let outcome = state.service.update_certification(&id, &request).await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_certification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WriteResponse<CertificationResponse>>, AppError> {
    let outcome = state.service.delete_certification(&id).await?;
    Ok(Json(outcome.into()))
}
