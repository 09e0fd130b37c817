//! Administrative endpoints: system statistics, user management, pattern
//! cache diagnostics and database backups. Every handler requires the
//! `admin` role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{require_admin, AuthUser},
    cache::CacheStats,
    entities::{order, quote, supplier, user},
    errors::ServiceError,
    handlers::auth::UserResponse,
    services::backup::{BackupInfo, BackupStats},
    services::order_number,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStats {
    pub total_users: u64,
    pub total_suppliers: u64,
    pub total_orders: u64,
    pub total_quotes: u64,
    pub active_orders: u64,
    pub completed_orders: u64,
    pub backups: BackupStats,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CleanupRequest {
    /// Backups younger than this many days are kept
    pub keep_days: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub deleted: usize,
}

/// Aggregate system statistics
#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    responses(
        (status = 200, description = "Statistics", body = ApiResponse<SystemStats>),
        (status = 403, description = "Administrator privileges required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn system_stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<SystemStats> {
    require_admin(&auth_user)?;
    let db = &*state.db;

    let total_users = user::Entity::find()
        .count(db)
        .await
        .map_err(ServiceError::from_db)?;
    let total_suppliers = supplier::Entity::find()
        .count(db)
        .await
        .map_err(ServiceError::from_db)?;
    let total_orders = order::Entity::find()
        .count(db)
        .await
        .map_err(ServiceError::from_db)?;
    let total_quotes = quote::Entity::find()
        .count(db)
        .await
        .map_err(ServiceError::from_db)?;
    let active_orders = order::Entity::find()
        .filter(order::Column::Status.eq(order::STATUS_ACTIVE))
        .count(db)
        .await
        .map_err(ServiceError::from_db)?;
    let completed_orders = order::Entity::find()
        .filter(order::Column::Status.eq(order::STATUS_COMPLETED))
        .count(db)
        .await
        .map_err(ServiceError::from_db)?;

    let backups = state.services.backup.stats().unwrap_or(BackupStats {
        count: 0,
        total_bytes: 0,
        newest: None,
        oldest: None,
    });

    Ok(Json(ApiResponse::success(SystemStats {
        total_users,
        total_suppliers,
        total_orders,
        total_quotes,
        active_orders,
        completed_orders,
        backups,
    })))
}

/// List all user accounts
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    responses(
        (status = 200, description = "Users", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Administrator privileges required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Vec<UserResponse>> {
    require_admin(&auth_user)?;

    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .all(&*state.db)
        .await
        .map_err(ServiceError::from_db)?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(Into::into).collect(),
    )))
}

/// Hit/miss counters for the order-number pattern cache
#[utoipa::path(
    get,
    path = "/api/v1/admin/cache-stats",
    responses(
        (status = 200, description = "Cache statistics"),
        (status = 403, description = "Administrator privileges required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn cache_stats(
    State(_state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<CacheStats> {
    require_admin(&auth_user)?;
    Ok(Json(ApiResponse::success(order_number::pattern_cache_stats())))
}

/// Snapshot the live database
#[utoipa::path(
    post,
    path = "/api/v1/admin/backups",
    responses(
        (status = 201, description = "Backup created", body = ApiResponse<BackupInfo>),
        (status = 422, description = "Datastore is not file-backed SQLite", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn create_backup(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<(StatusCode, Json<ApiResponse<BackupInfo>>), ServiceError> {
    require_admin(&auth_user)?;
    let info = state.services.backup.create_backup()?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(info))))
}

/// List existing backups, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/backups",
    responses(
        (status = 200, description = "Backups", body = ApiResponse<Vec<BackupInfo>>),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn list_backups(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Vec<BackupInfo>> {
    require_admin(&auth_user)?;
    let backups = state.services.backup.list_backups()?;
    Ok(Json(ApiResponse::success(backups)))
}

/// Verify a backup file's integrity
#[utoipa::path(
    get,
    path = "/api/v1/admin/backups/{name}/verify",
    params(("name" = String, Path, description = "Backup file name")),
    responses(
        (status = 200, description = "Backup is valid"),
        (status = 404, description = "Backup not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Backup is corrupt", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn verify_backup(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(name): Path<String>,
) -> ApiResult<()> {
    require_admin(&auth_user)?;
    state.services.backup.verify_backup(&name)?;
    Ok(Json(ApiResponse::success_with_message(
        (),
        format!("backup {} verified", name),
    )))
}

/// Restore the live database from a verified backup
#[utoipa::path(
    post,
    path = "/api/v1/admin/backups/{name}/restore",
    params(("name" = String, Path, description = "Backup file name")),
    responses(
        (status = 200, description = "Database restored"),
        (status = 404, description = "Backup not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn restore_backup(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(name): Path<String>,
) -> ApiResult<()> {
    require_admin(&auth_user)?;
    state.services.backup.restore_backup(&name)?;
    Ok(Json(ApiResponse::success_with_message(
        (),
        format!("database restored from {}", name),
    )))
}

/// Remove backups older than the retention window
#[utoipa::path(
    post,
    path = "/api/v1/admin/backups/cleanup",
    request_body = CleanupRequest,
    responses(
        (status = 200, description = "Cleanup finished", body = ApiResponse<CleanupResponse>),
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn cleanup_backups(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CleanupRequest>,
) -> ApiResult<CleanupResponse> {
    require_admin(&auth_user)?;
    let deleted = state.services.backup.cleanup_old_backups(request.keep_days)?;
    Ok(Json(ApiResponse::success(CleanupResponse { deleted })))
}
