mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

/// End-to-end: create, quote through the portal, award, reactivate, cancel.
#[tokio::test]
async fn full_order_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, access_token) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (order_id, order_no) = app.create_order(&admin, &[supplier_id]).await;

    assert!(order_no.starts_with("RX"));

    // Portal dashboard lists the open order.
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/portal/supplier/{access_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orders"][0]["order_no"], order_no.as_str());
    assert!(body["data"]["quoted_order_ids"]
        .as_array()
        .expect("array")
        .is_empty());

    // Supplier submits a quote.
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/portal/supplier/{access_token}/orders/{order_id}/quote"),
            None,
            Some(json!({"price": "1234.50", "delivery_time": "3 days"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Buyer awards the order at the quoted price.
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/select-winner"),
            Some(&admin),
            Some(json!({"supplier_id": supplier_id, "price": "1234.50"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "select winner failed: {body}");
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["selected_supplier_id"], supplier_id);

    // A completed order no longer accepts quotes.
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/portal/supplier/{access_token}/orders/{order_id}/quote"),
            None,
            Some(json!({"price": "1000.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Admin reactivates; the selection is cleared.
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/reactivate"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    assert!(body["data"]["selected_supplier_id"].is_null());
    assert!(body["data"]["selected_price"].is_null());

    // Cancel, then verify edits are refused.
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}"),
            Some(&admin),
            Some(json!({
                "warehouse": "Port B",
                "goods": "Palm oil",
                "delivery_address": "Addr Y",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn winner_selection_requires_matching_quote() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, access_token) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (quiet_id, _) = app.create_supplier(&admin, "Quiet Vendor", None).await;
    let (order_id, _) = app.create_order(&admin, &[supplier_id, quiet_id]).await;

    // A supplier without a quote cannot win.
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/select-winner"),
            Some(&admin),
            Some(json!({"supplier_id": quiet_id, "price": "10.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Quote, then confirm with a price that is off by more than 0.01.
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/portal/supplier/{access_token}/orders/{order_id}/quote"),
            None,
            Some(json!({"price": "500.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/select-winner"),
            Some(&admin),
            Some(json!({"supplier_id": supplier_id, "price": "500.50"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Within tolerance is accepted.
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/select-winner"),
            Some(&admin),
            Some(json!({"supplier_id": supplier_id, "price": "500.01"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "expected tolerance match: {body}");
}

/// Partition scoping: users see their own partition only, admin sees all.
#[tokio::test]
async fn business_type_partitions_scope_visibility() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let oil_buyer = app.register("oil_buyer", "oil").await;
    let fm_buyer = app.register("fm_buyer", "fast_moving").await;

    let (oil_supplier, _) = app.create_supplier(&oil_buyer, "Oil Vendor", None).await;
    let (oil_order, _) = app.create_order(&oil_buyer, &[oil_supplier]).await;

    // The other partition sees neither the order nor the supplier.
    let (status, body) = app
        .request(Method::GET, "/api/v1/orders", Some(&fm_buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{oil_order}"),
            Some(&fm_buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .request(Method::GET, "/api/v1/suppliers", Some(&fm_buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().expect("array").is_empty());

    // Admin sees everything.
    let (status, body) = app
        .request(Method::GET, "/api/v1/orders", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    // Cross-partition supplier invitations are rejected.
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&fm_buyer),
            Some(json!({
                "warehouse": "W",
                "goods": "G",
                "delivery_address": "D",
                "supplier_ids": [oil_supplier],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn buyer_endpoints_require_authentication() {
    let app = TestApp::new().await;

    let (status, _) = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", Some("not-a-real-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_endpoints_reject_regular_users() {
    let app = TestApp::new().await;
    let _admin = app.register("admin", "admin").await;
    let buyer = app.register("buyer", "oil").await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/admin/stats", Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, "/api/v1/admin/users", Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rotating_the_portal_token_invalidates_the_old_link() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, old_token) = app.create_supplier(&admin, "Acme Oils", None).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/suppliers/{supplier_id}/regenerate-token"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = body["data"]["access_token"].as_str().expect("token");
    assert_ne!(new_token, old_token);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/portal/supplier/{old_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/portal/supplier/{new_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
