use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::suppliers::{CreateSupplierRequest, SupplierResponse, UpdateSupplierRequest},
    ApiResponse, ApiResult, AppState,
};

/// Supplier detail including the tokenized portal link. Only returned from
/// the single-supplier endpoint, never from lists.
#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierDetailResponse {
    #[serde(flatten)]
    pub supplier: SupplierResponse,
    pub access_token: String,
    pub portal_url: String,
}

/// List suppliers visible to the actor
#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    responses(
        (status = 200, description = "Suppliers retrieved", body = ApiResponse<Vec<SupplierResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Vec<SupplierResponse>> {
    let suppliers = state.services.suppliers.list_suppliers(&auth_user).await?;
    Ok(Json(ApiResponse::success(
        suppliers.into_iter().map(Into::into).collect(),
    )))
}

/// Create a supplier with a freshly generated portal token
#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = CreateSupplierRequest,
    responses(
        (status = 201, description = "Supplier created", body = ApiResponse<SupplierDetailResponse>),
        (status = 409, description = "Name already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SupplierDetailResponse>>), ServiceError> {
    let supplier = state
        .services
        .suppliers
        .create_supplier(&auth_user, request)
        .await?;

    let portal_url = state.services.notifier.portal_url(&supplier.access_token);
    let access_token = supplier.access_token.clone();
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SupplierDetailResponse {
            supplier: supplier.into(),
            access_token,
            portal_url,
        })),
    ))
}

/// Get one supplier, including its portal link
#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    params(("id" = i64, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier retrieved", body = ApiResponse<SupplierDetailResponse>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(supplier_id): Path<i64>,
) -> ApiResult<SupplierDetailResponse> {
    let supplier = state
        .services
        .suppliers
        .get_supplier(&auth_user, supplier_id)
        .await?;

    let portal_url = state.services.notifier.portal_url(&supplier.access_token);
    let access_token = supplier.access_token.clone();
    Ok(Json(ApiResponse::success(SupplierDetailResponse {
        supplier: supplier.into(),
        access_token,
        portal_url,
    })))
}

/// Update a supplier's name and webhook URL
#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}",
    params(("id" = i64, Path, description = "Supplier id")),
    request_body = UpdateSupplierRequest,
    responses(
        (status = 200, description = "Supplier updated", body = ApiResponse<SupplierResponse>),
        (status = 409, description = "Name already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(supplier_id): Path<i64>,
    Json(request): Json<UpdateSupplierRequest>,
) -> ApiResult<SupplierResponse> {
    let supplier = state
        .services
        .suppliers
        .update_supplier(&auth_user, supplier_id, request)
        .await?;
    Ok(Json(ApiResponse::success(supplier.into())))
}

/// Delete a supplier (refused while quotes reference it)
#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/{id}",
    params(("id" = i64, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier deleted"),
        (status = 422, description = "Supplier has quotes on record", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(supplier_id): Path<i64>,
) -> ApiResult<()> {
    state
        .services
        .suppliers
        .delete_supplier(&auth_user, supplier_id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

/// Rotate a supplier's portal token, invalidating the previous link
#[utoipa::path(
    post,
    path = "/api/v1/suppliers/{id}/regenerate-token",
    params(("id" = i64, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Token rotated", body = ApiResponse<SupplierDetailResponse>),
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn regenerate_token(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(supplier_id): Path<i64>,
) -> ApiResult<SupplierDetailResponse> {
    let supplier = state
        .services
        .suppliers
        .regenerate_token(&auth_user, supplier_id)
        .await?;

    let portal_url = state.services.notifier.portal_url(&supplier.access_token);
    let access_token = supplier.access_token.clone();
    Ok(Json(ApiResponse::success(SupplierDetailResponse {
        supplier: supplier.into(),
        access_token,
        portal_url,
    })))
}
