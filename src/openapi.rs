use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "RFQ API",
        version = "1.0.0",
        description = r#"
# Trade-Inquiry / RFQ API

Buyers raise purchase orders and invite suppliers to quote; suppliers
submit prices through tokenized portal links; buyers compare quotes and
award a winner.

## Authentication

Buyer-side endpoints require a JWT bearer token obtained from
`/api/v1/auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

Supplier portal endpoints are authenticated solely by the opaque access
token embedded in the URL path.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 10) query
parameters.
        "#,
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Account registration and login"),
        (name = "Orders", description = "Purchase order management"),
        (name = "Quotes", description = "Quote comparison and analysis"),
        (name = "Suppliers", description = "Vendor records and portal credentials"),
        (name = "Portal", description = "Supplier-facing tokenized portal"),
        (name = "Admin", description = "Administrative endpoints")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::select_winner,
        crate::handlers::orders::reactivate_order,
        crate::handlers::orders::invited_suppliers,
        crate::handlers::orders::add_suppliers,

        // Quotes
        crate::handlers::quotes::analysis,
        crate::handlers::quotes::compare_order,
        crate::handlers::quotes::export_order,
        crate::handlers::quotes::supplier_history,

        // Suppliers
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,
        crate::handlers::suppliers::regenerate_token,

        // Portal
        crate::handlers::portal::dashboard,
        crate::handlers::portal::order_detail,
        crate::handlers::portal::submit_quote,
        crate::handlers::portal::my_quotes,

        // Admin
        crate::handlers::admin::system_stats,
        crate::handlers::admin::list_users,
        crate::handlers::admin::cache_stats,
        crate::handlers::admin::create_backup,
        crate::handlers::admin::list_backups,
        crate::handlers::admin::verify_backup,
        crate::handlers::admin::restore_backup,
        crate::handlers::admin::cleanup_backups,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Order types
            crate::services::orders::OrderResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::SelectWinnerRequest,
            crate::handlers::orders::AddSuppliersRequest,

            // Quote types
            crate::services::quotes::QuoteResponse,
            crate::services::quotes::QuoteWithSupplier,
            crate::services::quotes::QuoteStatistics,
            crate::services::quotes::QuoteComparison,
            crate::services::quotes::QuoteAnalysis,
            crate::services::quotes::SupplierHistory,
            crate::services::quotes::QuoteExport,
            crate::services::quotes::SubmitQuoteRequest,

            // Supplier types
            crate::services::suppliers::SupplierResponse,
            crate::services::suppliers::CreateSupplierRequest,
            crate::services::suppliers::UpdateSupplierRequest,
            crate::handlers::suppliers::SupplierDetailResponse,

            // Portal types
            crate::handlers::portal::PortalOrder,
            crate::handlers::portal::PortalDashboard,
            crate::handlers::portal::PortalOrderDetail,

            // Auth and admin types
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::TokenResponse,
            crate::handlers::admin::SystemStats,
            crate::handlers::admin::CleanupRequest,
            crate::handlers::admin::CleanupResponse,
            crate::services::backup::BackupInfo,
            crate::services::backup::BackupStats,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).expect("serialize openapi");
        assert!(json.contains("RFQ API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/portal/supplier/{token}"));
    }
}
