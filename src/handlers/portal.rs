//! Supplier-facing portal endpoints.
//!
//! Every route carries the supplier's opaque access token as a path
//! segment; presenting it is the sole authentication. Responses never
//! include other suppliers' prices.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    entities::{order, supplier},
    errors::ServiceError,
    services::quotes::{QuoteResponse, SubmitQuoteRequest},
    ApiResponse, ApiResult, AppState,
};

/// Order fields a supplier is allowed to see.
#[derive(Debug, Serialize, ToSchema)]
pub struct PortalOrder {
    pub id: i64,
    pub order_no: String,
    pub warehouse: String,
    pub goods: String,
    pub delivery_address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for PortalOrder {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_no: model.order_no,
            warehouse: model.warehouse,
            goods: model.goods,
            delivery_address: model.delivery_address,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PortalDashboard {
    pub supplier_id: i64,
    pub supplier_name: String,
    /// Active orders this supplier is invited to quote on
    pub orders: Vec<PortalOrder>,
    /// Order ids the supplier has already quoted
    pub quoted_order_ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PortalOrderDetail {
    pub order: PortalOrder,
    pub my_quote: Option<QuoteResponse>,
    /// How many quotes exist in total; individual competitor prices are
    /// never exposed here.
    pub total_quotes: u64,
}

async fn supplier_from_token(
    state: &AppState,
    token: &str,
) -> Result<supplier::Model, ServiceError> {
    state
        .services
        .suppliers
        .find_by_token(token)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound("portal link is invalid or has been revoked".into())
        })
}

/// Supplier dashboard: open orders and own quoting progress
#[utoipa::path(
    get,
    path = "/portal/supplier/{token}",
    params(("token" = String, Path, description = "Supplier access token")),
    responses(
        (status = 200, description = "Dashboard", body = ApiResponse<PortalDashboard>),
        (status = 404, description = "Unknown token", body = crate::errors::ErrorResponse),
    ),
    tag = "Portal"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<PortalDashboard> {
    let supplier = supplier_from_token(&state, &token).await?;

    let orders = state
        .services
        .suppliers
        .active_orders_for(&supplier)
        .await?;
    let quotes = state.services.quotes.quotes_by_supplier(supplier.id).await?;

    Ok(Json(ApiResponse::success(PortalDashboard {
        supplier_id: supplier.id,
        supplier_name: supplier.name,
        orders: orders.into_iter().map(Into::into).collect(),
        quoted_order_ids: quotes.into_iter().map(|q| q.order_id).collect(),
    })))
}

/// One order as seen by the invited supplier
#[utoipa::path(
    get,
    path = "/portal/supplier/{token}/orders/{order_id}",
    params(
        ("token" = String, Path, description = "Supplier access token"),
        ("order_id" = i64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<PortalOrderDetail>),
        (status = 404, description = "Unknown token or order", body = crate::errors::ErrorResponse),
    ),
    tag = "Portal"
)]
pub async fn order_detail(
    State(state): State<AppState>,
    Path((token, order_id)): Path<(String, i64)>,
) -> ApiResult<PortalOrderDetail> {
    let supplier = supplier_from_token(&state, &token).await?;

    let order = state
        .services
        .suppliers
        .order_for_supplier(&supplier, order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

    let my_quote = state.services.quotes.quote_for(order.id, supplier.id).await?;
    let total_quotes = state.services.quotes.count_for_order(order.id).await?;

    Ok(Json(ApiResponse::success(PortalOrderDetail {
        order: order.into(),
        my_quote,
        total_quotes,
    })))
}

/// Submit or update the supplier's quote on an active order
#[utoipa::path(
    post,
    path = "/portal/supplier/{token}/orders/{order_id}/quote",
    params(
        ("token" = String, Path, description = "Supplier access token"),
        ("order_id" = i64, Path, description = "Order id"),
    ),
    request_body = SubmitQuoteRequest,
    responses(
        (status = 200, description = "Quote saved", body = ApiResponse<QuoteResponse>),
        (status = 400, description = "Invalid price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not open for quotes", body = crate::errors::ErrorResponse),
    ),
    tag = "Portal"
)]
pub async fn submit_quote(
    State(state): State<AppState>,
    Path((token, order_id)): Path<(String, i64)>,
    Json(request): Json<SubmitQuoteRequest>,
) -> ApiResult<QuoteResponse> {
    let supplier = supplier_from_token(&state, &token).await?;

    let quote = state
        .services
        .quotes
        .submit_quote(&supplier, order_id, request)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        quote,
        "quote saved".into(),
    )))
}

/// All quotes this supplier has submitted
#[utoipa::path(
    get,
    path = "/portal/supplier/{token}/quotes",
    params(("token" = String, Path, description = "Supplier access token")),
    responses(
        (status = 200, description = "Quotes", body = ApiResponse<Vec<QuoteResponse>>),
        (status = 404, description = "Unknown token", body = crate::errors::ErrorResponse),
    ),
    tag = "Portal"
)]
pub async fn my_quotes(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Vec<QuoteResponse>> {
    let supplier = supplier_from_token(&state, &token).await?;
    let quotes = state.services.quotes.quotes_by_supplier(supplier.id).await?;
    Ok(Json(ApiResponse::success(quotes)))
}
