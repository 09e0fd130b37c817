use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use rfq_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

const TEST_JWT_SECRET: &str =
    "integration_test_secret_key_that_is_at_least_64_characters_long_0000";

/// Helper harness spinning up the full application state over an on-disk
/// SQLite database in a temporary directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let db_file = tmp.path().join("rfq_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single pooled connection keeps SQLite write transactions strictly
        // serialized, which makes concurrent-creation tests deterministic.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.backup_dir = tmp.path().join("backups").display().to_string();
        cfg.notify_backoff_ms = 1;
        cfg.order_no_backoff_ms = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg);
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", rfq_api::api_v1_routes())
            .nest("/portal", rfq_api::portal_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Issue a request against the in-memory router and decode the JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse response body")
        };

        (status, value)
    }

    /// Register an account and return its bearer token. The first account
    /// registered against an empty database becomes the administrator.
    pub async fn register(&self, username: &str, business_type: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "password": "correct-horse-battery",
                    "business_type": business_type,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["data"]["token"]
            .as_str()
            .expect("token in register response")
            .to_string()
    }

    /// Create a supplier and return (id, access_token).
    pub async fn create_supplier(
        &self,
        token: &str,
        name: &str,
        webhook_url: Option<&str>,
    ) -> (i64, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/suppliers",
                Some(token),
                Some(serde_json::json!({
                    "name": name,
                    "webhook_url": webhook_url,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create supplier failed: {body}");
        (
            body["data"]["id"].as_i64().expect("supplier id"),
            body["data"]["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
        )
    }

    /// Create an order inviting the given suppliers; returns (id, order_no).
    pub async fn create_order(&self, token: &str, supplier_ids: &[i64]) -> (i64, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/orders",
                Some(token),
                Some(serde_json::json!({
                    "warehouse": "Port A",
                    "goods": "Soybean oil 100t",
                    "delivery_address": "Addr X",
                    "supplier_ids": supplier_ids,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create order failed: {body}");
        (
            body["data"]["id"].as_i64().expect("order id"),
            body["data"]["order_no"]
                .as_str()
                .expect("order number")
                .to_string(),
        )
    }
}
