use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::user,
    errors::ServiceError,
    ApiResponse, AppState,
};

const DEFAULT_BUSINESS_TYPE: &str = "oil";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Partition for the new account; defaults to the standard partition
    pub business_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub business_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            business_type: model.business_type,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Register a new buyer account.
///
/// The very first account in an empty database becomes the administrator;
/// everyone afterwards is a regular user pinned to a partition.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TokenResponse>>), ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let username = request.username.trim().to_string();

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .count(&*state.db)
        .await
        .map_err(ServiceError::from_db)?;
    if existing > 0 {
        return Err(ServiceError::Conflict("username is already taken".into()));
    }

    let user_count = user::Entity::find()
        .count(&*state.db)
        .await
        .map_err(ServiceError::from_db)?;
    let (role, business_type) = if user_count == 0 {
        (user::ROLE_ADMIN.to_string(), user::ROLE_ADMIN.to_string())
    } else {
        (
            user::ROLE_USER.to_string(),
            request
                .business_type
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_BUSINESS_TYPE)
                .to_string(),
        )
    };

    let password_hash = state.services.auth.hash_password(&request.password)?;

    let created = user::ActiveModel {
        username: Set(username),
        password_hash: Set(password_hash),
        role: Set(role),
        business_type: Set(business_type),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&*state.db)
    .await
    .map_err(ServiceError::from_db)?;

    info!(user_id = created.id, username = %created.username, "user registered");

    let token = state.services.auth.generate_token(&created)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TokenResponse {
            token,
            user: created.into(),
        })),
    ))
}

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ServiceError> {
    let user = user::Entity::find()
        .filter(user::Column::Username.eq(request.username.trim()))
        .one(&*state.db)
        .await
        .map_err(ServiceError::from_db)?
        .ok_or_else(|| ServiceError::AuthError("invalid username or password".into()))?;

    state
        .services
        .auth
        .verify_password(&request.password, &user.password_hash)?;

    let token = state.services.auth.generate_token(&user)?;
    info!(user_id = user.id, "user logged in");

    Ok(Json(ApiResponse::success(TokenResponse {
        token,
        user: user.into(),
    })))
}
