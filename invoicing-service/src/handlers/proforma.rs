//! Proforma invoices share the invoice shape; only the kind differs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::invoices::list_response;
use crate::dtos::invoice::{
    CreateInvoiceRequest, InvoiceQuery, InvoiceResponse, InvoiceWithRelatedResponse,
    ListResponse, UpdateInvoiceRequest, UpdateProformaStatusRequest,
};
use crate::dtos::WriteResponse;
use crate::models::InvoiceKind;
use crate::startup::AppState;
use service_core::error::AppError;

#[tracing::instrument(skip(state, request))]
pub async fn create_proforma(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<WriteResponse<InvoiceResponse>>), AppError> {
    request.validate()?;
    let outcome = state.service.create_proforma(&request).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_proforma(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceWithRelatedResponse>, AppError> {
    let (invoice, related) = state
        .service
        .get_invoice_with_related(InvoiceKind::Proforma, &id)
        .await?;
    Ok(Json(InvoiceWithRelatedResponse {
        invoice: invoice.into(),
        related: related.into_iter().map(InvoiceResponse::from).collect(),
    }))
}

#[tracing::instrument(skip(state))]
pub async fn list_proformas(
    State(state): State<AppState>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<ListResponse<InvoiceResponse>>, AppError> {
    let listing = state
        .service
        .filter_invoices(InvoiceKind::Proforma, &query)
        .await?;
    Ok(Json(list_response(listing)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_proforma(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<WriteResponse<InvoiceResponse>>, AppError> {
    request.validate()?;
    let outcome = state
        .service
        .update_invoice(InvoiceKind::Proforma, &id, &request)
        .await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_proforma(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WriteResponse<InvoiceResponse>>, AppError> {
    let outcome = state
        .service
        .delete_invoice(InvoiceKind::Proforma, &id)
        .await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_proforma_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProformaStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .service
        .set_proforma_status(&id, request.status)
        .await?;
    Ok(Json(invoice.into()))
}
