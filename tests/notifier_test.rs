use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rfq_api::entities::{order, supplier};
use rfq_api::logging::{setup_logger, LoggerConfig};
use rfq_api::services::notifier::{NotifierConfig, SupplierNotifier};

fn notifier(max_attempts: u32) -> SupplierNotifier {
    SupplierNotifier::new(
        NotifierConfig {
            max_attempts,
            timeout: Duration::from_secs(2),
            backoff_unit: Duration::from_millis(1),
        },
        "http://buyer.example.com".into(),
        setup_logger(LoggerConfig::default()),
    )
}

fn sample_order() -> order::Model {
    order::Model {
        id: 1,
        order_no: "RX240315001".into(),
        warehouse: "Port A".into(),
        goods: "Soybean oil 100t".into(),
        delivery_address: "Addr X".into(),
        status: "active".into(),
        selected_supplier_id: None,
        selected_price: None,
        user_id: 1,
        business_type: "oil".into(),
        created_at: Utc::now(),
    }
}

fn supplier_with_webhook(id: i64, name: &str, webhook_url: Option<String>) -> supplier::Model {
    supplier::Model {
        id,
        name: name.into(),
        access_token: format!("token-{id}"),
        webhook_url,
        user_id: 1,
        business_type: "oil".into(),
        created_at: Utc::now(),
    }
}

/// An endpoint that always fails is attempted exactly `max_attempts` times
/// and the supplier lands in the failed list.
#[tokio::test]
async fn persistent_failure_exhausts_exactly_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let suppliers = vec![supplier_with_webhook(
        1,
        "Flaky Vendor",
        Some(format!("{}/hook", server.uri())),
    )];

    let report = notifier(3)
        .notify_suppliers(&sample_order(), &suppliers)
        .await;

    assert_eq!(report.notified, 0);
    assert_eq!(report.failed, vec!["Flaky Vendor".to_string()]);
    assert_eq!(report.skipped, 0);
    // Mock expectations (exactly 3 requests) are verified on drop.
}

/// An endpoint that recovers on the second attempt is tried exactly twice
/// and counted as a success.
#[tokio::test]
async fn recovery_on_second_attempt_counts_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let suppliers = vec![supplier_with_webhook(
        1,
        "Recovering Vendor",
        Some(format!("{}/hook", server.uri())),
    )];

    let report = notifier(3)
        .notify_suppliers(&sample_order(), &suppliers)
        .await;

    assert_eq!(report.notified, 1);
    assert!(report.failed.is_empty());
    assert_eq!(server.received_requests().await.expect("requests").len(), 2);
}

/// The notifier never errors, whatever mix of suppliers it is given, and
/// the report always accounts for the whole input list.
#[tokio::test]
async fn mixed_supplier_list_is_fully_accounted_for() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let suppliers = vec![
        supplier_with_webhook(1, "Healthy Vendor", Some(format!("{}/good", server.uri()))),
        supplier_with_webhook(2, "No Webhook Vendor", None),
        supplier_with_webhook(3, "Blank Webhook Vendor", Some(String::new())),
        // Nothing listens on port 9 (discard); connection refused.
        supplier_with_webhook(4, "Unreachable Vendor", Some("http://127.0.0.1:9/hook".into())),
        supplier_with_webhook(5, "Malformed Vendor", Some("not a url at all".into())),
    ];

    let report = notifier(2)
        .notify_suppliers(&sample_order(), &suppliers)
        .await;

    assert_eq!(report.notified, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(
        report.failed,
        vec!["Unreachable Vendor".to_string(), "Malformed Vendor".to_string()]
    );
    assert_eq!(
        report.notified + report.skipped + report.failed.len(),
        suppliers.len()
    );
}

/// Payload shape: `{"msgtype":"text","text":{"content":...}}` carrying the
/// order number and the tokenized portal link.
#[tokio::test]
async fn webhook_payload_matches_wire_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let suppliers = vec![supplier_with_webhook(
        7,
        "Acme Oils",
        Some(format!("{}/hook", server.uri())),
    )];

    let report = notifier(3)
        .notify_suppliers(&sample_order(), &suppliers)
        .await;
    assert_eq!(report.notified, 1);

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1);

    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    assert_eq!(body["msgtype"], "text");
    let content = body["text"]["content"].as_str().expect("content");
    assert!(content.contains("RX240315001"));
    assert!(content.contains("Port A"));
    assert!(content.contains("http://buyer.example.com/portal/supplier/token-7"));

    assert_eq!(
        requests[0]
            .headers
            .get("content-type")
            .map(|v| v.to_str().unwrap_or_default()),
        Some("application/json")
    );
}
