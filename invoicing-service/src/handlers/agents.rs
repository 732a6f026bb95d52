use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::dtos::directory::{
    AgentListQuery, AgentResponse, CreateAgentRequest, UpdateAgentRequest,
};
use crate::dtos::invoice::UpdateTargetRequest;
use crate::services::reports::AgentProgress;
use crate::services::Page;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_agent(
    State(state): State<AppState>,
    Json(request): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>), AppError> {
    request.validate()?;
    let agent = state.service.create_agent(&request).await?;
    Ok((StatusCode::CREATED, Json(agent.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, AppError> {
    Ok(Json(state.service.get_agent(&id).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentListQuery>,
) -> Result<Json<Vec<AgentResponse>>, AppError> {
    let agents = state
        .service
        .list_agents(query.manager_id, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(agents.into_iter().map(AgentResponse::from).collect()))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    request.validate()?;
    Ok(Json(state.service.update_agent(&id, &request).await?.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_agent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, request))]
pub async fn update_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTargetRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    Ok(Json(
        state.service.update_target(&id, request.target).await?.into(),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn agent_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentProgress>, AppError> {
    Ok(Json(state.service.agent_progress(&id).await?))
}
