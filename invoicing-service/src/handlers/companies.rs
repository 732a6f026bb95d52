use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::dtos::directory::{CompanyResponse, CreateCompanyRequest, UpdateCompanyRequest};
use crate::dtos::invoice::ListResponse;
use crate::dtos::ListQuery;
use crate::services::Page;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_company(
    State(state): State<AppState>,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<CompanyResponse>), AppError> {
    request.validate()?;
    let company = state.service.create_company(&request).await?;
    Ok((StatusCode::CREATED, Json(company.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompanyResponse>, AppError> {
    Ok(Json(state.service.get_company(&id).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<CompanyResponse>>, AppError> {
    let page = Page::new(query.limit, query.offset);
    let (companies, total) = state.service.list_companies(page).await?;
    Ok(Json(ListResponse {
        items: companies.into_iter().map(CompanyResponse::from).collect(),
        total: Some(total),
        limit: page.limit,
        offset: page.offset,
    }))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCompanyRequest>,
) -> Result<Json<CompanyResponse>, AppError> {
    request.validate()?;
    Ok(Json(state.service.update_company(&id, &request).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_company(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
