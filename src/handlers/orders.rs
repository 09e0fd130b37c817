use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::orders::{
        CreateOrderRequest, OrderResponse, SelectWinnerRequest, UpdateOrderRequest,
    },
    services::suppliers::SupplierResponse,
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddSuppliersRequest {
    pub supplier_ids: Vec<i64>,
}

/// List orders with pagination and optional status filtering
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 10)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<OrderResponse>> {
    let result = state
        .services
        .orders
        .list_orders(&auth_user, query.page, query.limit, query.status.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.orders,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// Create a new order and notify the invited suppliers
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order number allocation failed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let (order, suppliers) = state
        .services
        .orders
        .create_order(&auth_user, request)
        .await?;

    // Notification is best-effort and runs after the commit; its outcome
    // only shapes the status message.
    let report = state
        .services
        .notifier
        .notify_suppliers(&order, &suppliers)
        .await;

    let delivered: Vec<i64> = suppliers
        .iter()
        .filter(|s| {
            s.webhook_url.as_deref().is_some_and(|u| !u.is_empty())
                && !report.failed.contains(&s.name)
        })
        .map(|s| s.id)
        .collect();
    if let Err(e) = state.services.orders.mark_notified(order.id, &delivered).await {
        info!(error = %e, order_id = order.id, "failed to record notification bookkeeping");
    }

    let message = format!("order {} created, {}", order.order_no, report.summary());
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(order.into(), message)),
    ))
}

/// Get a single order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_order(&auth_user, order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update an active order's editable fields
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 422, description = "Order is not active", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .update_order(&auth_user, order_id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Cancel an active order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 422, description = "Order is not active", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .cancel_order(&auth_user, order_id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Select the winning supplier, completing the order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/select-winner",
    params(("id" = i64, Path, description = "Order id")),
    request_body = SelectWinnerRequest,
    responses(
        (status = 200, description = "Winner selected", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Supplier has no quote or price mismatch", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn select_winner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
    Json(request): Json<SelectWinnerRequest>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .select_winner(&auth_user, order_id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Reactivate a completed order, clearing the winner (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reactivate",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order reactivated", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Administrator privileges required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn reactivate_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .reset_to_active(&auth_user, order_id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// The suppliers invited to quote on an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/suppliers",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Invited suppliers", body = ApiResponse<Vec<SupplierResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn invited_suppliers(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
) -> ApiResult<Vec<SupplierResponse>> {
    let suppliers = state
        .services
        .orders
        .invited_suppliers(&auth_user, order_id)
        .await?;
    Ok(Json(ApiResponse::success(
        suppliers.into_iter().map(Into::into).collect(),
    )))
}

/// Invite additional suppliers to an active order and notify the new ones
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/suppliers",
    params(("id" = i64, Path, description = "Order id")),
    request_body = AddSuppliersRequest,
    responses(
        (status = 200, description = "Suppliers added", body = ApiResponse<Vec<SupplierResponse>>),
        (status = 422, description = "Order is not active", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn add_suppliers(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<i64>,
    Json(request): Json<AddSuppliersRequest>,
) -> ApiResult<Vec<SupplierResponse>> {
    let (order, added) = state
        .services
        .orders
        .add_suppliers(&auth_user, order_id, &request.supplier_ids)
        .await?;

    if added.is_empty() {
        return Ok(Json(ApiResponse::success_with_message(
            Vec::new(),
            "all selected suppliers were already invited".into(),
        )));
    }

    let report = state
        .services
        .notifier
        .notify_suppliers(&order, &added)
        .await;

    let delivered: Vec<i64> = added
        .iter()
        .filter(|s| {
            s.webhook_url.as_deref().is_some_and(|u| !u.is_empty())
                && !report.failed.contains(&s.name)
        })
        .map(|s| s.id)
        .collect();
    if let Err(e) = state.services.orders.mark_notified(order_id, &delivered).await {
        info!(error = %e, order_id, "failed to record notification bookkeeping");
    }

    let message = format!("added {} supplier(s), {}", added.len(), report.summary());
    Ok(Json(ApiResponse::success_with_message(
        added.into_iter().map(Into::into).collect(),
        message,
    )))
}
