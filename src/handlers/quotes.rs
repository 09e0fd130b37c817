use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    auth::AuthUser,
    services::quotes::{QuoteAnalysis, QuoteComparison, QuoteExport, SupplierHistory},
    ApiResponse, ApiResult, AppState,
};

/// Cross-order quote analysis for the actor's partition
#[utoipa::path(
    get,
    path = "/api/v1/quotes/analysis",
    responses(
        (status = 200, description = "Analysis computed", body = ApiResponse<QuoteAnalysis>),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn analysis(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<QuoteAnalysis> {
    let analysis = state.services.quotes.analysis(&auth_user).await?;
    Ok(Json(ApiResponse::success(analysis)))
}

/// Compare all quotes on an order, cheapest first, with price statistics
#[utoipa::path(
    get,
    path = "/api/v1/quotes/order/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Comparison computed", body = ApiResponse<QuoteComparison>),
        (status = 404, description = "Order not found or has no quotes", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn compare_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<QuoteComparison> {
    let comparison = state
        .services
        .quotes
        .compare_order(&auth_user, order_id)
        .await?;
    Ok(Json(ApiResponse::success(comparison)))
}

/// Export one order's quotes as a structured document
#[utoipa::path(
    get,
    path = "/api/v1/quotes/order/{id}/export",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Export document", body = ApiResponse<QuoteExport>),
        (status = 404, description = "Order not found or has no quotes", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn export_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<QuoteExport> {
    let export = state
        .services
        .quotes
        .export_order(&auth_user, order_id)
        .await?;
    Ok(Json(ApiResponse::success(export)))
}

/// A supplier's quote history with win statistics
#[utoipa::path(
    get,
    path = "/api/v1/quotes/supplier/{id}/history",
    params(("id" = i64, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "History computed", body = ApiResponse<SupplierHistory>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn supplier_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(supplier_id): Path<i64>,
) -> ApiResult<SupplierHistory> {
    let history = state
        .services
        .quotes
        .supplier_history(&auth_user, supplier_id)
        .await?;
    Ok(Json(ApiResponse::success(history)))
}
