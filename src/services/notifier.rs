//! Best-effort webhook notification of invited suppliers.
//!
//! Runs after the order transaction has committed. A webhook outage must
//! never prevent an order from being created, so every failure here is
//! absorbed into the returned report; the caller only uses it to build a
//! status message.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use slog::{error, info, warn, Logger};

use crate::config::AppConfig;
use crate::entities::{order, supplier};

const GOODS_PREVIEW_CHARS: usize = 100;
const ADDRESS_PREVIEW_CHARS: usize = 50;

/// Wire format expected by supplier webhook endpoints.
#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    pub msgtype: &'static str,
    pub text: WebhookText,
}

#[derive(Debug, Serialize)]
pub struct WebhookText {
    pub content: String,
}

impl WebhookMessage {
    pub fn text(content: String) -> Self {
        Self {
            msgtype: "text",
            text: WebhookText { content },
        }
    }
}

/// Outcome of one notification round. Purely informational.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    /// Suppliers whose webhook accepted the message
    pub notified: usize,
    /// Display names of suppliers whose webhook ultimately failed
    pub failed: Vec<String>,
    /// Suppliers skipped because they have no webhook configured
    pub skipped: usize,
}

impl NotificationReport {
    /// Human-readable summary for the buyer-facing status message.
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("notified {} supplier(s)", self.notified)
        } else {
            format!(
                "notified {} supplier(s), {} notification(s) failed",
                self.notified,
                self.failed.len()
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff_unit: Duration,
}

impl From<&AppConfig> for NotifierConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.notify_max_attempts.max(1),
            timeout: Duration::from_secs(cfg.notify_timeout_secs),
            backoff_unit: Duration::from_millis(cfg.notify_backoff_ms),
        }
    }
}

#[derive(Clone)]
pub struct SupplierNotifier {
    client: reqwest::Client,
    config: NotifierConfig,
    public_base_url: String,
    logger: Logger,
}

impl SupplierNotifier {
    pub fn new(config: NotifierConfig, public_base_url: String, logger: Logger) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            logger,
        }
    }

    /// The tokenized portal link embedded in every notification. Presenting
    /// the token is the supplier's only credential.
    pub fn portal_url(&self, access_token: &str) -> String {
        format!("{}/portal/supplier/{}", self.public_base_url, access_token)
    }

    fn build_content(&self, order: &order::Model, portal_url: &str) -> String {
        format!(
            "New RFQ order\n\n\
             Order no: {}\n\
             Goods: {}\n\
             Warehouse: {}\n\
             Delivery address: {}\n\n\
             Submit your quote: {}",
            order.order_no,
            preview(&order.goods, GOODS_PREVIEW_CHARS),
            order.warehouse,
            preview(&order.delivery_address, ADDRESS_PREVIEW_CHARS),
            portal_url,
        )
    }

    /// Notify each supplier about a new order, retrying transient failures.
    ///
    /// Never returns an error: suppliers without a webhook URL are skipped
    /// silently, and delivery failures are collected in the report after the
    /// retry budget is spent.
    pub async fn notify_suppliers(
        &self,
        order: &order::Model,
        suppliers: &[supplier::Model],
    ) -> NotificationReport {
        let mut report = NotificationReport::default();

        for supplier in suppliers {
            let Some(webhook_url) = supplier.webhook_url.as_deref().filter(|u| !u.is_empty())
            else {
                info!(self.logger, "supplier has no webhook, skipping";
                    "supplier" => &supplier.name);
                report.skipped += 1;
                continue;
            };

            if self.deliver(order, supplier, webhook_url).await {
                report.notified += 1;
            } else {
                report.failed.push(supplier.name.clone());
            }
        }

        info!(self.logger, "supplier notification round finished";
            "order_no" => &order.order_no,
            "notified" => report.notified,
            "failed" => report.failed.len(),
            "skipped" => report.skipped);
        if !report.failed.is_empty() {
            error!(self.logger, "notification failures";
                "suppliers" => report.failed.join(", "));
        }

        report
    }

    async fn deliver(
        &self,
        order: &order::Model,
        supplier: &supplier::Model,
        webhook_url: &str,
    ) -> bool {
        let portal_url = self.portal_url(&supplier.access_token);
        let message = WebhookMessage::text(self.build_content(order, &portal_url));

        for attempt in 1..=self.config.max_attempts {
            let result = self
                .client
                .post(webhook_url)
                .json(&message)
                .timeout(self.config.timeout)
                .send()
                .await;

            match result {
                Ok(response) if response.status() == StatusCode::OK => {
                    info!(self.logger, "notification delivered";
                        "supplier" => &supplier.name,
                        "attempt" => attempt);
                    return true;
                }
                Ok(response) => {
                    warn!(self.logger, "webhook returned non-200";
                        "supplier" => &supplier.name,
                        "status" => response.status().as_u16(),
                        "attempt" => attempt);
                }
                Err(err) if err.is_timeout() => {
                    error!(self.logger, "webhook timed out";
                        "supplier" => &supplier.name,
                        "attempt" => attempt);
                }
                Err(err) if err.is_connect() => {
                    error!(self.logger, "webhook connection failed";
                        "supplier" => &supplier.name,
                        "attempt" => attempt);
                }
                Err(err) => {
                    error!(self.logger, "webhook request failed";
                        "supplier" => &supplier.name,
                        "error" => %err,
                        "attempt" => attempt);
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.backoff_unit * attempt).await;
            }
        }

        false
    }
}

/// Truncate to at most `max` characters, marking the cut with an ellipsis.
/// Works on character boundaries so multi-byte text never splits.
fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{setup_logger, LoggerConfig};
    use chrono::Utc;

    fn notifier() -> SupplierNotifier {
        SupplierNotifier::new(
            NotifierConfig {
                max_attempts: 3,
                timeout: Duration::from_secs(5),
                backoff_unit: Duration::from_millis(0),
            },
            "http://localhost:8080/".into(),
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

    #[test]
    fn portal_url_embeds_token_and_strips_trailing_slash() {
        let url = notifier().portal_url("tok123");
        assert_eq!(url, "http://localhost:8080/portal/supplier/tok123");
    }

    #[test]
    fn message_content_carries_order_fields_and_link() {
        let n = notifier();
        let content = n.build_content(&sample_order(), &n.portal_url("tok123"));
        assert!(content.contains("RX240315001"));
        assert!(content.contains("Soybean oil 100t"));
        assert!(content.contains("Port A"));
        assert!(content.contains("/portal/supplier/tok123"));
    }

    #[test]
    fn long_fields_are_truncated_with_ellipsis() {
        let mut order = sample_order();
        order.goods = "g".repeat(300);
        let n = notifier();
        let content = n.build_content(&order, "http://example.invalid");
        let goods_line = content
            .lines()
            .find(|l| l.starts_with("Goods:"))
            .expect("goods line");
        assert!(goods_line.ends_with("..."));
        assert_eq!(goods_line.len(), "Goods: ".len() + GOODS_PREVIEW_CHARS + 3);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "仓库".repeat(40);
        let cut = preview(&text, 50);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 53);
    }

    #[test]
    fn report_summary_formats() {
        let ok = NotificationReport {
            notified: 2,
            failed: vec![],
            skipped: 1,
        };
        assert_eq!(ok.summary(), "notified 2 supplier(s)");

        let bad = NotificationReport {
            notified: 1,
            failed: vec!["Acme".into()],
            skipped: 0,
        };
        assert_eq!(
            bad.summary(),
            "notified 1 supplier(s), 1 notification(s) failed"
        );
    }
}
