use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{order, quote, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitQuoteRequest {
    pub price: Decimal,
    pub delivery_time: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    pub id: i64,
    pub order_id: i64,
    pub supplier_id: i64,
    pub price: Decimal,
    pub delivery_time: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<quote::Model> for QuoteResponse {
    fn from(model: quote::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            supplier_id: model.supplier_id,
            price: model.price,
            delivery_time: model.delivery_time,
            remarks: model.remarks,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteWithSupplier {
    #[serde(flatten)]
    pub quote: QuoteResponse,
    pub supplier_name: String,
}

/// Aggregates over one order's quotes, cheapest-first semantics.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteStatistics {
    pub count: usize,
    pub valid_count: usize,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub avg_price: Decimal,
    pub price_range: Decimal,
    /// Population variance of the prices (display only)
    pub variance: f64,
    pub std_deviation: f64,
}

impl QuoteStatistics {
    fn empty(count: usize) -> Self {
        Self {
            count,
            valid_count: 0,
            min_price: Decimal::ZERO,
            max_price: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            price_range: Decimal::ZERO,
            variance: 0.0,
            std_deviation: 0.0,
        }
    }

    /// Compute statistics over the in-bounds prices of a quote set.
    pub fn from_prices(count: usize, prices: &[Decimal]) -> Self {
        let valid: Vec<Decimal> = prices
            .iter()
            .copied()
            .filter(|p| quote::Model::price_in_bounds(*p))
            .collect();
        if valid.is_empty() {
            return Self::empty(count);
        }

        let min = valid.iter().copied().min().unwrap_or(Decimal::ZERO);
        let max = valid.iter().copied().max().unwrap_or(Decimal::ZERO);
        let sum: Decimal = valid.iter().copied().sum();
        let avg = sum / Decimal::from(valid.len());

        // Var(X) = E[X^2] - mu^2, computed in f64 because it is display-only.
        let mean = avg.to_f64().unwrap_or(0.0);
        let mean_sq = valid
            .iter()
            .map(|p| p.to_f64().unwrap_or(0.0).powi(2))
            .sum::<f64>()
            / valid.len() as f64;
        let variance = (mean_sq - mean * mean).max(0.0);

        Self {
            count,
            valid_count: valid.len(),
            min_price: min,
            max_price: max,
            avg_price: avg,
            price_range: max - min,
            variance,
            std_deviation: variance.sqrt(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteComparison {
    pub order: crate::services::orders::OrderResponse,
    pub quotes: Vec<QuoteWithSupplier>,
    pub stats: QuoteStatistics,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierQuoteStats {
    pub supplier_id: i64,
    pub supplier_name: String,
    pub quote_count: usize,
    pub win_count: usize,
    pub avg_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteAnalysis {
    pub total_orders: u64,
    pub orders_with_quotes: usize,
    pub total_quotes: u64,
    pub completed_orders: u64,
    pub supplier_stats: Vec<SupplierQuoteStats>,
    pub recent_quotes: Vec<QuoteWithSupplier>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierHistory {
    pub supplier_id: i64,
    pub supplier_name: String,
    pub quotes: Vec<QuoteResponse>,
    pub total_quotes: usize,
    pub win_count: usize,
    pub win_rate_percent: f64,
    pub avg_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

/// Export document for one order's quotes.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteExport {
    pub order: ExportedOrder,
    pub quotes: Vec<ExportedQuote>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportedOrder {
    pub order_no: String,
    pub goods: String,
    pub warehouse: String,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportedQuote {
    pub supplier_name: String,
    pub price: Decimal,
    pub delivery_time: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Service for supplier quotes: portal-side submission and buyer-side
/// comparison/analysis.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl QuoteService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!(error = %e, "failed to send quote event");
            }
        }
    }

    async fn visible_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<order::Model, ServiceError> {
        actor
            .scope()
            .apply(
                order::Entity::find_by_id(order_id),
                order::Column::BusinessType,
            )
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))
    }

    async fn supplier_names(
        &self,
        supplier_ids: Vec<i64>,
    ) -> Result<HashMap<i64, String>, ServiceError> {
        if supplier_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let suppliers = supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(supplier_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        Ok(suppliers.into_iter().map(|s| (s.id, s.name)).collect())
    }

    fn with_names(
        &self,
        quotes: Vec<quote::Model>,
        names: &HashMap<i64, String>,
    ) -> Vec<QuoteWithSupplier> {
        quotes
            .into_iter()
            .map(|q| {
                let supplier_name = names
                    .get(&q.supplier_id)
                    .cloned()
                    .unwrap_or_else(|| format!("supplier {}", q.supplier_id));
                QuoteWithSupplier {
                    quote: q.into(),
                    supplier_name,
                }
            })
            .collect()
    }

    /// Submit or refresh a quote for an order (portal side).
    ///
    /// One quote row exists per (order, supplier); re-submission updates the
    /// price, delivery time and remarks and refreshes the timestamp.
    #[instrument(skip(self, request), fields(order_id, supplier_id = supplier.id))]
    pub async fn submit_quote(
        &self,
        supplier: &supplier::Model,
        order_id: i64,
        request: SubmitQuoteRequest,
    ) -> Result<QuoteResponse, ServiceError> {
        if !quote::Model::price_in_bounds(request.price) {
            return Err(ServiceError::ValidationError(
                "price must be positive and within the allowed range".into(),
            ));
        }
        let delivery_time = request
            .delivery_time
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if delivery_time.as_ref().is_some_and(|s| s.len() > 50) {
            return Err(ServiceError::ValidationError(
                "delivery time must not exceed 50 characters".into(),
            ));
        }
        let remarks = request
            .remarks
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // The order must be active and this supplier must have been invited.
        let order = supplier
            .find_related(order::Entity)
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(order::STATUS_ACTIVE))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| {
                ServiceError::NotFound("order not found or no longer open for quotes".into())
            })?;

        let existing = quote::Entity::find()
            .filter(quote::Column::OrderId.eq(order.id))
            .filter(quote::Column::SupplierId.eq(supplier.id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        let now = Utc::now();
        let (saved, event) = match existing {
            Some(current) => {
                let updated = quote::ActiveModel {
                    id: Set(current.id),
                    price: Set(request.price),
                    delivery_time: Set(delivery_time),
                    remarks: Set(remarks),
                    created_at: Set(now),
                    ..Default::default()
                }
                .update(&*self.db)
                .await
                .map_err(ServiceError::from_db)?;
                (
                    updated,
                    Event::QuoteUpdated {
                        order_id: order.id,
                        supplier_id: supplier.id,
                    },
                )
            }
            None => {
                let inserted = quote::ActiveModel {
                    order_id: Set(order.id),
                    supplier_id: Set(supplier.id),
                    price: Set(request.price),
                    delivery_time: Set(delivery_time),
                    remarks: Set(remarks),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await
                .map_err(ServiceError::from_db)?;
                (
                    inserted,
                    Event::QuoteSubmitted {
                        order_id: order.id,
                        supplier_id: supplier.id,
                    },
                )
            }
        };

        info!(
            order_id = order.id,
            supplier_id = supplier.id,
            "quote saved"
        );
        self.emit(event).await;
        Ok(saved.into())
    }

    /// All quotes for an order, cheapest first (buyer side).
    pub async fn quotes_for_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<Vec<QuoteWithSupplier>, ServiceError> {
        let order = self.visible_order(actor, order_id).await?;
        let quotes = quote::Entity::find()
            .filter(quote::Column::OrderId.eq(order.id))
            .order_by_asc(quote::Column::Price)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        let names = self
            .supplier_names(quotes.iter().map(|q| q.supplier_id).collect())
            .await?;
        Ok(self.with_names(quotes, &names))
    }

    /// Comparison view: the order, its quotes cheapest first, and price
    /// statistics.
    #[instrument(skip(self), fields(order_id))]
    pub async fn compare_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<QuoteComparison, ServiceError> {
        let order = self.visible_order(actor, order_id).await?;
        let quotes = self.quotes_for_order(actor, order_id).await?;
        if quotes.is_empty() {
            return Err(ServiceError::NotFound(
                "no quotes have been submitted for this order yet".into(),
            ));
        }

        let prices: Vec<Decimal> = quotes.iter().map(|q| q.quote.price).collect();
        let stats = QuoteStatistics::from_prices(quotes.len(), &prices);

        Ok(QuoteComparison {
            order: order.into(),
            quotes,
            stats,
        })
    }

    /// Cross-order analysis for the actor's partition.
    #[instrument(skip(self))]
    pub async fn analysis(&self, actor: &AuthUser) -> Result<QuoteAnalysis, ServiceError> {
        let scope = actor.scope();
        let orders = scope
            .apply(order::Entity::find(), order::Column::BusinessType)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let quotes = if order_ids.is_empty() {
            Vec::new()
        } else {
            quote::Entity::find()
                .filter(quote::Column::OrderId.is_in(order_ids.clone()))
                .order_by_desc(quote::Column::CreatedAt)
                .all(&*self.db)
                .await
                .map_err(ServiceError::from_db)?
        };

        let completed_orders = orders.iter().filter(|o| o.is_completed()).count() as u64;
        let orders_with_quotes = {
            let quoted: std::collections::HashSet<i64> =
                quotes.iter().map(|q| q.order_id).collect();
            quoted.len()
        };

        // Wins: how often each supplier was selected on a completed order.
        let mut wins: HashMap<i64, usize> = HashMap::new();
        for order in &orders {
            if let Some(winner) = order.selected_supplier_id {
                *wins.entry(winner).or_default() += 1;
            }
        }

        let mut per_supplier: HashMap<i64, Vec<Decimal>> = HashMap::new();
        for q in &quotes {
            per_supplier.entry(q.supplier_id).or_default().push(q.price);
        }
        let names = self.supplier_names(per_supplier.keys().copied().collect()).await?;

        let mut supplier_stats: Vec<SupplierQuoteStats> = per_supplier
            .into_iter()
            .map(|(supplier_id, prices)| {
                let count = prices.len();
                let sum: Decimal = prices.iter().copied().sum();
                SupplierQuoteStats {
                    supplier_id,
                    supplier_name: names
                        .get(&supplier_id)
                        .cloned()
                        .unwrap_or_else(|| format!("supplier {}", supplier_id)),
                    quote_count: count,
                    win_count: wins.get(&supplier_id).copied().unwrap_or(0),
                    avg_price: sum / Decimal::from(count.max(1)),
                    min_price: prices.iter().copied().min().unwrap_or(Decimal::ZERO),
                    max_price: prices.iter().copied().max().unwrap_or(Decimal::ZERO),
                }
            })
            .collect();
        supplier_stats.sort_by(|a, b| b.quote_count.cmp(&a.quote_count));

        let total_quotes = quotes.len() as u64;
        let recent_models: Vec<quote::Model> = quotes.into_iter().take(10).collect();
        let recent_names = self
            .supplier_names(recent_models.iter().map(|q| q.supplier_id).collect())
            .await?;
        let recent_quotes = self.with_names(recent_models, &recent_names);

        Ok(QuoteAnalysis {
            total_orders: orders.len() as u64,
            orders_with_quotes,
            total_quotes,
            completed_orders,
            supplier_stats,
            recent_quotes,
        })
    }

    /// Export one order's quotes as a structured document.
    pub async fn export_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<QuoteExport, ServiceError> {
        let order = self.visible_order(actor, order_id).await?;
        let quotes = self.quotes_for_order(actor, order_id).await?;
        if quotes.is_empty() {
            return Err(ServiceError::NotFound(
                "this order has no quotes to export".into(),
            ));
        }

        Ok(QuoteExport {
            order: ExportedOrder {
                order_no: order.order_no,
                goods: order.goods,
                warehouse: order.warehouse,
                delivery_address: order.delivery_address,
                created_at: order.created_at,
            },
            quotes: quotes
                .into_iter()
                .map(|q| ExportedQuote {
                    supplier_name: q.supplier_name,
                    price: q.quote.price,
                    delivery_time: q.quote.delivery_time,
                    remarks: q.quote.remarks,
                    created_at: q.quote.created_at,
                })
                .collect(),
        })
    }

    /// A supplier's quote history with win statistics (buyer side).
    #[instrument(skip(self), fields(supplier_id))]
    pub async fn supplier_history(
        &self,
        actor: &AuthUser,
        supplier_id: i64,
    ) -> Result<SupplierHistory, ServiceError> {
        let scope = actor.scope();
        let supplier = scope
            .apply(
                supplier::Entity::find_by_id(supplier_id),
                supplier::Column::BusinessType,
            )
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("supplier {} not found", supplier_id))
            })?;

        let quotes = quote::Entity::find()
            .filter(quote::Column::SupplierId.eq(supplier.id))
            .order_by_desc(quote::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        let order_ids: Vec<i64> = quotes.iter().map(|q| q.order_id).collect();
        let win_count = if order_ids.is_empty() {
            0
        } else {
            order::Entity::find()
                .filter(order::Column::Id.is_in(order_ids))
                .filter(order::Column::SelectedSupplierId.eq(supplier.id))
                .count(&*self.db)
                .await
                .map_err(ServiceError::from_db)? as usize
        };

        let prices: Vec<Decimal> = quotes.iter().map(|q| q.price).collect();
        let total = quotes.len();
        let win_rate = if total > 0 {
            win_count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let sum: Decimal = prices.iter().copied().sum();

        Ok(SupplierHistory {
            supplier_id: supplier.id,
            supplier_name: supplier.name,
            quotes: quotes.into_iter().map(Into::into).collect(),
            total_quotes: total,
            win_count,
            win_rate_percent: (win_rate * 100.0).round() / 100.0,
            avg_price: if total > 0 {
                sum / Decimal::from(total)
            } else {
                Decimal::ZERO
            },
            min_price: prices.iter().copied().min().unwrap_or(Decimal::ZERO),
            max_price: prices.iter().copied().max().unwrap_or(Decimal::ZERO),
        })
    }

    /// All quotes a supplier has submitted (portal side).
    pub async fn quotes_by_supplier(
        &self,
        supplier_id: i64,
    ) -> Result<Vec<QuoteResponse>, ServiceError> {
        let quotes = quote::Entity::find()
            .filter(quote::Column::SupplierId.eq(supplier_id))
            .order_by_desc(quote::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        Ok(quotes.into_iter().map(Into::into).collect())
    }

    /// A supplier's own quote on one order, if any (portal side).
    pub async fn quote_for(
        &self,
        order_id: i64,
        supplier_id: i64,
    ) -> Result<Option<QuoteResponse>, ServiceError> {
        let quote = quote::Entity::find()
            .filter(quote::Column::OrderId.eq(order_id))
            .filter(quote::Column::SupplierId.eq(supplier_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        Ok(quote.map(Into::into))
    }

    /// Number of quotes on an order; shown to suppliers without revealing
    /// competitors' prices.
    pub async fn count_for_order(&self, order_id: i64) -> Result<u64, ServiceError> {
        quote::Entity::find()
            .filter(quote::Column::OrderId.eq(order_id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::from_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn statistics_over_prices() {
        let prices = [dec!(10.00), dec!(20.00), dec!(30.00)];
        let stats = QuoteStatistics::from_prices(3, &prices);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.min_price, dec!(10.00));
        assert_eq!(stats.max_price, dec!(30.00));
        assert_eq!(stats.avg_price, dec!(20.00));
        assert_eq!(stats.price_range, dec!(20.00));
        // Population variance of {10, 20, 30} is 200/3.
        assert!((stats.variance - 200.0 / 3.0).abs() < 1e-6);
        assert!((stats.std_deviation - (200.0f64 / 3.0).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_prices_are_excluded() {
        let prices = [dec!(10.00), Decimal::ZERO, dec!(-5.00)];
        let stats = QuoteStatistics::from_prices(3, &prices);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.valid_count, 1);
        assert_eq!(stats.min_price, dec!(10.00));
        assert_eq!(stats.variance, 0.0);
    }

    #[test]
    fn empty_price_set_yields_zeroed_stats() {
        let stats = QuoteStatistics::from_prices(0, &[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.valid_count, 0);
        assert_eq!(stats.avg_price, Decimal::ZERO);
        assert_eq!(stats.std_deviation, 0.0);
    }
}
