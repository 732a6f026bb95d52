use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::dtos::invoice::{
    CreateInvoiceRequest, InvoiceQuery, InvoiceResponse, InvoiceWithRelatedResponse,
    ListResponse, UpdateInvoiceRequest, UpdateTermStatusRequest,
};
use crate::dtos::WriteResponse;
use crate::models::{InvoiceKind, Term};
use crate::services::Listing;
use crate::startup::AppState;
use service_core::error::AppError;

pub(crate) fn list_response(listing: Listing<crate::models::Invoice>) -> ListResponse<InvoiceResponse> {
    ListResponse {
        items: listing.items.into_iter().map(InvoiceResponse::from).collect(),
        total: Some(listing.total),
        limit: listing.page.limit,
        offset: listing.page.offset,
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<WriteResponse<InvoiceResponse>>), AppError> {
    request.validate()?;
    let outcome = state.service.create_invoice(&request).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceWithRelatedResponse>, AppError> {
    let (invoice, related) = state
        .service
        .get_invoice_with_related(InvoiceKind::Final, &id)
        .await?;
    Ok(Json(InvoiceWithRelatedResponse {
        invoice: invoice.into(),
        related: related.into_iter().map(InvoiceResponse::from).collect(),
    }))
}

#[tracing::instrument(skip(state))]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<ListResponse<InvoiceResponse>>, AppError> {
    let listing = state
        .service
        .filter_invoices(InvoiceKind::Final, &query)
        .await?;
    Ok(Json(list_response(listing)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<WriteResponse<InvoiceResponse>>, AppError> {
    request.validate()?;
    let outcome = state
        .service
        .update_invoice(InvoiceKind::Final, &id, &request)
        .await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WriteResponse<InvoiceResponse>>, AppError> {
    let outcome = state
        .service
        .delete_invoice(InvoiceKind::Final, &id)
        .await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_term_status(
    State(state): State<AppState>,
    Path((id, term_id)): Path<(String, String)>,
    Json(request): Json<UpdateTermStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .service
        .update_term_status(&id, &term_id, request.status)
        .await?;
    Ok(Json(invoice.into()))
}

#[tracing::instrument(skip(state))]
pub async fn pending_terms(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Term>>, AppError> {
    Ok(Json(state.service.pending_terms(&id).await?))
}
