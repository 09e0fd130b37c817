mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};

use rfq_api::entities::quote;

use common::TestApp;

/// Quoted prices travel as JSON strings; parse for scale-insensitive
/// comparison (SQLite normalizes trailing zeros).
fn price(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("price string")).expect("parse price")
}

/// Re-submitting a quote updates the single (order, supplier) row in place
/// and refreshes its timestamp.
#[tokio::test]
async fn quote_resubmission_upserts_in_place() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, access_token) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (order_id, _) = app.create_order(&admin, &[supplier_id]).await;

    let quote_uri = format!("/portal/supplier/{access_token}/orders/{order_id}/quote");

    let (status, _) = app
        .request(
            Method::POST,
            &quote_uri,
            None,
            Some(json!({"price": "900.00", "remarks": "first pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let first = quote::Entity::find()
        .filter(quote::Column::OrderId.eq(order_id))
        .one(app.db())
        .await
        .expect("query quote")
        .expect("quote exists");

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (status, body) = app
        .request(
            Method::POST,
            &quote_uri,
            None,
            Some(json!({"price": "850.00", "delivery_time": "5 days"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(price(&body["data"]["price"]), dec!(850));

    let second = quote::Entity::find()
        .filter(quote::Column::OrderId.eq(order_id))
        .one(app.db())
        .await
        .expect("query quote")
        .expect("quote exists");

    assert_eq!(second.id, first.id, "quote must be upserted, not duplicated");
    assert_eq!(second.price, dec!(850));
    assert_eq!(second.delivery_time.as_deref(), Some("5 days"));
    assert!(second.created_at > first.created_at, "timestamp must refresh");

    let count = quote::Entity::find()
        .filter(quote::Column::OrderId.eq(order_id))
        .count(app.db())
        .await
        .expect("count quotes");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn out_of_range_prices_are_rejected() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, access_token) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (order_id, _) = app.create_order(&admin, &[supplier_id]).await;

    let quote_uri = format!("/portal/supplier/{access_token}/orders/{order_id}/quote");

    for bad_price in ["0", "-10.00", "10000000000.00"] {
        let (status, _) = app
            .request(Method::POST, &quote_uri, None, Some(json!({"price": bad_price})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {bad_price} accepted");
    }
}

/// Quote comparison sorts cheapest-first and reports price statistics.
#[tokio::test]
async fn comparison_reports_sorted_quotes_and_statistics() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let mut supplier_ids = Vec::new();
    let mut tokens = Vec::new();
    for name in ["Vendor A", "Vendor B", "Vendor C"] {
        let (id, token) = app.create_supplier(&admin, name, None).await;
        supplier_ids.push(id);
        tokens.push(token);
    }
    let (order_id, _) = app.create_order(&admin, &supplier_ids).await;

    for (token, quote_price) in tokens.iter().zip(["30.00", "10.00", "20.00"]) {
        let (status, _) = app
            .request(
                Method::POST,
                &format!("/portal/supplier/{token}/orders/{order_id}/quote"),
                None,
                Some(json!({"price": quote_price})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/quotes/order/{order_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "comparison failed: {body}");

    let quotes = body["data"]["quotes"].as_array().expect("quotes");
    assert_eq!(quotes.len(), 3);
    assert_eq!(price(&quotes[0]["price"]), dec!(10));
    assert_eq!(quotes[0]["supplier_name"], "Vendor B");
    assert_eq!(price(&quotes[2]["price"]), dec!(30));

    let stats = &body["data"]["stats"];
    assert_eq!(stats["count"], 3);
    assert_eq!(price(&stats["min_price"]), dec!(10));
    assert_eq!(price(&stats["max_price"]), dec!(30));
    assert_eq!(price(&stats["avg_price"]), dec!(20));
    assert_eq!(price(&stats["price_range"]), dec!(20));
}

#[tokio::test]
async fn comparison_of_unquoted_order_is_not_found() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, _) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (order_id, _) = app.create_order(&admin, &[supplier_id]).await;

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/quotes/order/{order_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Suppliers with quotes on record refuse deletion; quote-free ones delete.
#[tokio::test]
async fn supplier_with_quotes_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (quoting_id, access_token) = app.create_supplier(&admin, "Quoting Vendor", None).await;
    let (idle_id, _) = app.create_supplier(&admin, "Idle Vendor", None).await;
    let (order_id, _) = app.create_order(&admin, &[quoting_id, idle_id]).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/portal/supplier/{access_token}/orders/{order_id}/quote"),
            None,
            Some(json!({"price": "100.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/suppliers/{quoting_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/suppliers/{idle_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

/// Export carries the order header and every quote with its supplier name.
#[tokio::test]
async fn export_includes_order_and_quotes() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, access_token) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (order_id, order_no) = app.create_order(&admin, &[supplier_id]).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/portal/supplier/{access_token}/orders/{order_id}/quote"),
            None,
            Some(json!({"price": "123.45", "remarks": "incl. freight"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/quotes/order/{order_id}/export"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["order_no"], order_no.as_str());
    assert_eq!(body["data"]["quotes"][0]["supplier_name"], "Acme Oils");
    assert_eq!(price(&body["data"]["quotes"][0]["price"]), dec!(123.45));
    assert_eq!(body["data"]["quotes"][0]["remarks"], "incl. freight");
}

/// Win statistics follow awarded orders.
#[tokio::test]
async fn supplier_history_tracks_wins() {
    let app = TestApp::new().await;
    let admin = app.register("admin", "admin").await;
    let (supplier_id, access_token) = app.create_supplier(&admin, "Acme Oils", None).await;
    let (order_id, _) = app.create_order(&admin, &[supplier_id]).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/portal/supplier/{access_token}/orders/{order_id}/quote"),
            None,
            Some(json!({"price": "777.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/select-winner"),
            Some(&admin),
            Some(json!({"supplier_id": supplier_id, "price": "777.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/quotes/supplier/{supplier_id}/history"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_quotes"], 1);
    assert_eq!(body["data"]["win_count"], 1);
    assert_eq!(body["data"]["win_rate_percent"], 100.0);

    let (status, body) = app
        .request(Method::GET, "/api/v1/quotes/analysis", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_orders"], 1);
    assert_eq!(body["data"]["completed_orders"], 1);
    assert_eq!(body["data"]["total_quotes"], 1);
    assert_eq!(body["data"]["supplier_stats"][0]["win_count"], 1);
}
