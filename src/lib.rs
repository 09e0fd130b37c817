//! RFQ API Library
//!
//! Core functionality for the trade-inquiry backend: buyers raise purchase
//! orders and invite suppliers, suppliers quote through tokenized portal
//! links, buyers award a winner.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Filter orders by lifecycle status
    pub status: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    10
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Success with a human-readable status line (e.g. the supplier
    /// notification summary after order creation).
    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Buyer-side API surface, mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    let auth = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login));

    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/:id",
            get(handlers::orders::get_order).put(handlers::orders::update_order),
        )
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/orders/:id/select-winner",
            post(handlers::orders::select_winner),
        )
        .route(
            "/orders/:id/reactivate",
            post(handlers::orders::reactivate_order),
        )
        .route(
            "/orders/:id/suppliers",
            get(handlers::orders::invited_suppliers).post(handlers::orders::add_suppliers),
        );

    let quotes = Router::new()
        .route("/quotes/analysis", get(handlers::quotes::analysis))
        .route("/quotes/order/:id", get(handlers::quotes::compare_order))
        .route(
            "/quotes/order/:id/export",
            get(handlers::quotes::export_order),
        )
        .route(
            "/quotes/supplier/:id/history",
            get(handlers::quotes::supplier_history),
        );

    let suppliers = Router::new()
        .route(
            "/suppliers",
            get(handlers::suppliers::list_suppliers).post(handlers::suppliers::create_supplier),
        )
        .route(
            "/suppliers/:id",
            get(handlers::suppliers::get_supplier)
                .put(handlers::suppliers::update_supplier)
                .delete(handlers::suppliers::delete_supplier),
        )
        .route(
            "/suppliers/:id/regenerate-token",
            post(handlers::suppliers::regenerate_token),
        );

    let admin = Router::new()
        .route("/admin/stats", get(handlers::admin::system_stats))
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/cache-stats", get(handlers::admin::cache_stats))
        .route(
            "/admin/backups",
            get(handlers::admin::list_backups).post(handlers::admin::create_backup),
        )
        .route(
            "/admin/backups/cleanup",
            post(handlers::admin::cleanup_backups),
        )
        .route(
            "/admin/backups/:name/verify",
            get(handlers::admin::verify_backup),
        )
        .route(
            "/admin/backups/:name/restore",
            post(handlers::admin::restore_backup),
        );

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(auth)
        .merge(orders)
        .merge(quotes)
        .merge(suppliers)
        .merge(admin)
}

/// Supplier-facing portal, mounted under `/portal`. Authenticated purely by
/// the opaque access token in the path.
pub fn portal_routes() -> Router<AppState> {
    Router::new()
        .route("/supplier/:token", get(handlers::portal::dashboard))
        .route(
            "/supplier/:token/orders/:order_id",
            get(handlers::portal::order_detail),
        )
        .route(
            "/supplier/:token/orders/:order_id/quote",
            post(handlers::portal::submit_quote),
        )
        .route("/supplier/:token/quotes", get(handlers::portal::my_quotes))
}

async fn api_status() -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "rfq-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn paginated_response_computes_page_count() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 23, 1, 10);
        assert_eq!(page.total_pages, 3);

        let empty = PaginatedResponse::<i32>::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn success_with_message_keeps_both() {
        let resp = ApiResponse::success_with_message(7, "notified 2 supplier(s)".into());
        assert!(resp.success);
        assert_eq!(resp.data, Some(7));
        assert_eq!(resp.message.as_deref(), Some("notified 2 supplier(s)"));
    }
}
