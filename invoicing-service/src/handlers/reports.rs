use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use validator::Validate;

use super::invoices::list_response;
use crate::dtos::invoice::{InvoiceResponse, ListResponse};
use crate::dtos::report::{
    DashboardResponse, DateRangeQuery, StandardGroupResponse, YearMonthQuery, YearQuery,
};
use crate::dtos::ListQuery;
use crate::models::Currency;
use crate::services::reports::{
    AgentClosure, GstReport, ManagerPerformance, MonthlyAmount, TargetPoint, TdsReport,
};
use crate::services::Page;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, AppError> {
    Ok(Json(state.service.dashboard().await?.into()))
}

pub async fn pending_totals(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<Currency, Decimal>>, AppError> {
    Ok(Json(state.service.pending_totals().await?))
}

#[tracing::instrument(skip(state))]
pub async fn gst_report(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<GstReport>, AppError> {
    Ok(Json(state.service.gst_report(range.from, range.to).await?))
}

#[tracing::instrument(skip(state))]
pub async fn tds_report(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<TdsReport>, AppError> {
    Ok(Json(state.service.tds_report(range.from, range.to).await?))
}

#[tracing::instrument(skip(state))]
pub async fn monthly_closure(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyAmount>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .service
            .monthly_closure(query.year, query.agent_id.as_deref())
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn agentwise_closures(
    State(state): State<AppState>,
    Query(query): Query<YearMonthQuery>,
) -> Result<Json<Vec<AgentClosure>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .service
            .agentwise_closures(query.year, query.month)
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn agent_performance(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<TargetPoint>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .service
            .agent_monthly_performance(&agent_id, query.year)
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn manager_monthly_closure(
    State(state): State<AppState>,
    Path(manager_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthlyAmount>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .service
            .manager_monthly_closure(&manager_id, query.year)
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn manager_target_graph(
    State(state): State<AppState>,
    Path(manager_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<TargetPoint>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .service
            .manager_target_graph(&manager_id, query.year)
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn overall_manager_performance(
    State(state): State<AppState>,
    Query(query): Query<YearMonthQuery>,
) -> Result<Json<Vec<ManagerPerformance>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .service
            .overall_manager_performance(query.year, query.month)
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn pending_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<InvoiceResponse>>, AppError> {
    let listing = state
        .service
        .pending_invoices(Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(list_response(listing)))
}

#[tracing::instrument(skip(state))]
pub async fn pending_by_standard(
    State(state): State<AppState>,
) -> Result<Json<Vec<StandardGroupResponse>>, AppError> {
    let groups = state.service.pending_by_standard().await?;
    Ok(Json(
        groups
            .into_iter()
            .map(|(standard, invoices)| StandardGroupResponse {
                standard,
                invoices: invoices.into_iter().map(InvoiceResponse::from).collect(),
            })
            .collect(),
    ))
}

pub async fn unique_invoice_count(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = state.service.unique_invoice_count().await?;
    Ok(Json(serde_json::json!({ "unique_invoice_count": count })))
}
