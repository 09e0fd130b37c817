use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::AuthUser,
    db::{BusinessScope, DbPool},
    entities::{order, order_supplier, quote, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
    services::order_number::OrderNumberAllocator,
};

/// Tolerance when confirming the winning price against the stored quote.
const PRICE_MATCH_TOLERANCE: Decimal = dec!(0.01);

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 200, message = "Warehouse must be between 1 and 200 characters"))]
    pub warehouse: String,
    #[validate(length(min = 1, message = "Goods description is required"))]
    pub goods: String,
    #[validate(length(
        min = 1,
        max = 300,
        message = "Delivery address must be between 1 and 300 characters"
    ))]
    pub delivery_address: String,
    #[validate(length(min = 1, message = "At least one supplier must be invited"))]
    pub supplier_ids: Vec<i64>,
    /// Admins may create orders in any partition; others are pinned to their
    /// own and this field is ignored.
    pub business_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, max = 200, message = "Warehouse must be between 1 and 200 characters"))]
    pub warehouse: String,
    #[validate(length(min = 1, message = "Goods description is required"))]
    pub goods: String,
    #[validate(length(
        min = 1,
        max = 300,
        message = "Delivery address must be between 1 and 300 characters"
    ))]
    pub delivery_address: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectWinnerRequest {
    pub supplier_id: i64,
    /// Confirmed price; must match the supplier's quote within 0.01
    pub price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub order_no: String,
    pub warehouse: String,
    pub goods: String,
    pub delivery_address: String,
    pub status: String,
    pub selected_supplier_id: Option<i64>,
    pub selected_price: Option<Decimal>,
    pub user_id: i64,
    pub business_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_no: model.order_no,
            warehouse: model.warehouse,
            goods: model.goods,
            delivery_address: model.delivery_address,
            status: model.status,
            selected_supplier_id: model.selected_supplier_id,
            selected_price: model.selected_price,
            user_id: model.user_id,
            business_type: model.business_type,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing RFQ orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    allocator: OrderNumberAllocator,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        allocator: OrderNumberAllocator,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            allocator,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!(error = %e, "failed to send order event");
            }
        }
    }

    /// Fetch an order the actor is allowed to see, or NotFound.
    async fn visible_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<order::Model, ServiceError> {
        let scope = actor.scope();
        let query = scope.apply(
            order::Entity::find_by_id(order_id),
            order::Column::BusinessType,
        );
        query
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))
    }

    /// Load the requested suppliers and confirm every one of them is visible
    /// to the actor and lives in the order's partition.
    async fn resolve_invited_suppliers(
        &self,
        scope: &BusinessScope,
        business_type: &str,
        supplier_ids: &[i64],
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        let suppliers = supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(supplier_ids.to_vec()))
            .filter(supplier::Column::BusinessType.eq(business_type))
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        if suppliers.len() != supplier_ids.len()
            || suppliers.iter().any(|s| !scope.allows(&s.business_type))
        {
            return Err(ServiceError::ValidationError(
                "one or more selected suppliers are invalid".into(),
            ));
        }

        Ok(suppliers)
    }

    /// Create a new order and invite the given suppliers.
    ///
    /// The row is inserted with a temporary placeholder number, then the
    /// final number is allocated and written inside the same transaction.
    /// Allocation failure (daily cap, retries exhausted) aborts the whole
    /// transaction; no partial state survives. Returns the created order and
    /// the invited supplier models so the caller can run notification after
    /// commit.
    #[instrument(skip(self, request), fields(user_id = actor.user_id))]
    pub async fn create_order(
        &self,
        actor: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<(order::Model, Vec<supplier::Model>), ServiceError> {
        let request = CreateOrderRequest {
            warehouse: request.warehouse.trim().to_string(),
            goods: request.goods.trim().to_string(),
            delivery_address: request.delivery_address.trim().to_string(),
            ..request
        };
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let scope = actor.scope();
        let business_type =
            scope.resolve_tag(request.business_type.as_deref(), &actor.business_type);
        let suppliers = self
            .resolve_invited_suppliers(&scope, &business_type, &request.supplier_ids)
            .await?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let now = Utc::now();
        let inserted = order::ActiveModel {
            order_no: Set(self.allocator.temp_order_no()),
            warehouse: Set(request.warehouse),
            goods: Set(request.goods),
            delivery_address: Set(request.delivery_address),
            status: Set(order::STATUS_ACTIVE.to_string()),
            user_id: Set(actor.user_id),
            business_type: Set(business_type),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::from_db)?;

        // Replace the placeholder now that the row exists. Dropping the
        // transaction on any failure below rolls the insert back.
        let order_no = self.allocator.allocate(&txn).await?;
        let order_model = order::ActiveModel {
            id: Set(inserted.id),
            order_no: Set(order_no.clone()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(ServiceError::from_db)?;

        let invitations: Vec<order_supplier::ActiveModel> = suppliers
            .iter()
            .map(|s| order_supplier::ActiveModel {
                order_id: Set(order_model.id),
                supplier_id: Set(s.id),
                notified: Set(false),
            })
            .collect();
        order_supplier::Entity::insert_many(invitations)
            .exec(&txn)
            .await
            .map_err(ServiceError::from_db)?;

        txn.commit().await.map_err(ServiceError::from_db)?;

        info!(
            order_id = order_model.id,
            order_no = %order_no,
            suppliers = suppliers.len(),
            "order created"
        );

        self.emit(Event::OrderCreated {
            order_id: order_model.id,
            order_no: order_no.clone(),
        })
        .await;

        Ok((order_model, suppliers))
    }

    /// Lists orders visible to the actor, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        actor: &AuthUser,
        page: u64,
        per_page: u64,
        status: Option<&str>,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = actor
            .scope()
            .apply(order::Entity::find(), order::Column::BusinessType);
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await.map_err(ServiceError::from_db)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from_db)?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Retrieves an order by id (scope-checked).
    pub async fn get_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<OrderResponse, ServiceError> {
        Ok(self.visible_order(actor, order_id).await?.into())
    }

    /// The suppliers invited to quote on an order.
    pub async fn invited_suppliers(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        let order = self.visible_order(actor, order_id).await?;
        order
            .find_related(supplier::Entity)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)
    }

    /// Update the editable fields of an active order.
    #[instrument(skip(self, request), fields(order_id))]
    pub async fn update_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let request = UpdateOrderRequest {
            warehouse: request.warehouse.trim().to_string(),
            goods: request.goods.trim().to_string(),
            delivery_address: request.delivery_address.trim().to_string(),
        };
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let order = self.visible_order(actor, order_id).await?;
        if !order.is_active() {
            return Err(ServiceError::InvalidOperation(
                "only active orders can be edited".into(),
            ));
        }

        let updated = order::ActiveModel {
            id: Set(order.id),
            warehouse: Set(request.warehouse),
            goods: Set(request.goods),
            delivery_address: Set(request.delivery_address),
            ..Default::default()
        }
        .update(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        self.emit(Event::OrderUpdated(order_id)).await;
        Ok(updated.into())
    }

    /// Cancel an active order.
    #[instrument(skip(self), fields(order_id))]
    pub async fn cancel_order(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.visible_order(actor, order_id).await?;
        if !order.is_active() {
            return Err(ServiceError::InvalidOperation(
                "only active orders can be cancelled".into(),
            ));
        }

        let updated = order::ActiveModel {
            id: Set(order.id),
            status: Set(order::STATUS_CANCELLED.to_string()),
            ..Default::default()
        }
        .update(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(order_id, order_no = %updated.order_no, "order cancelled");
        self.emit(Event::OrderCancelled(order_id)).await;
        Ok(updated.into())
    }

    /// Pick the winning supplier for an active order.
    ///
    /// The supplier must have quoted this order and the confirmed price must
    /// match the stored quote within the tolerance.
    #[instrument(skip(self, request), fields(order_id, supplier_id = request.supplier_id))]
    pub async fn select_winner(
        &self,
        actor: &AuthUser,
        order_id: i64,
        request: SelectWinnerRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.visible_order(actor, order_id).await?;
        if !order.is_active() {
            return Err(ServiceError::InvalidOperation(
                "only active orders can be awarded".into(),
            ));
        }

        let quote = quote::Entity::find()
            .filter(quote::Column::OrderId.eq(order_id))
            .filter(quote::Column::SupplierId.eq(request.supplier_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "the selected supplier has not quoted this order".into(),
                )
            })?;

        if (quote.price - request.price).abs() > PRICE_MATCH_TOLERANCE {
            return Err(ServiceError::ValidationError(
                "confirmed price does not match the supplier's quote".into(),
            ));
        }

        let updated = order::ActiveModel {
            id: Set(order.id),
            selected_supplier_id: Set(Some(request.supplier_id)),
            selected_price: Set(Some(quote.price)),
            status: Set(order::STATUS_COMPLETED.to_string()),
            ..Default::default()
        }
        .update(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(
            order_id,
            supplier_id = request.supplier_id,
            "winning supplier selected, order completed"
        );
        self.emit(Event::OrderCompleted {
            order_id,
            supplier_id: request.supplier_id,
        })
        .await;
        Ok(updated.into())
    }

    /// Reactivate a completed order, clearing the winner selection.
    /// Administrator-only.
    #[instrument(skip(self), fields(order_id))]
    pub async fn reset_to_active(
        &self,
        actor: &AuthUser,
        order_id: i64,
    ) -> Result<OrderResponse, ServiceError> {
        crate::auth::require_admin(actor)?;

        let order = self.visible_order(actor, order_id).await?;
        if !order.is_completed() {
            return Err(ServiceError::InvalidOperation(
                "only completed orders can be reactivated".into(),
            ));
        }
        if order.selected_supplier_id.is_none() {
            return Err(ServiceError::InvalidOperation(
                "order has no selected supplier to clear".into(),
            ));
        }

        let updated = order::ActiveModel {
            id: Set(order.id),
            selected_supplier_id: Set(None),
            selected_price: Set(None),
            status: Set(order::STATUS_ACTIVE.to_string()),
            ..Default::default()
        }
        .update(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(order_id, order_no = %updated.order_no, "order reactivated");
        self.emit(Event::OrderReactivated(order_id)).await;
        Ok(updated.into())
    }

    /// Invite additional suppliers to an active order. Suppliers already
    /// invited are skipped; the order and the newly attached suppliers are
    /// returned so the caller can notify them.
    #[instrument(skip(self, supplier_ids), fields(order_id))]
    pub async fn add_suppliers(
        &self,
        actor: &AuthUser,
        order_id: i64,
        supplier_ids: &[i64],
    ) -> Result<(order::Model, Vec<supplier::Model>), ServiceError> {
        if supplier_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one supplier must be selected".into(),
            ));
        }

        let order = self.visible_order(actor, order_id).await?;
        if !order.is_active() {
            return Err(ServiceError::InvalidOperation(
                "suppliers can only be added to active orders".into(),
            ));
        }

        let scope = actor.scope();
        let requested = self
            .resolve_invited_suppliers(&scope, &order.business_type, supplier_ids)
            .await?;

        let already_invited: Vec<i64> = order_supplier::Entity::find()
            .filter(order_supplier::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .into_iter()
            .map(|link| link.supplier_id)
            .collect();

        let new_suppliers: Vec<supplier::Model> = requested
            .into_iter()
            .filter(|s| !already_invited.contains(&s.id))
            .collect();

        if new_suppliers.is_empty() {
            return Ok((order, Vec::new()));
        }

        let invitations: Vec<order_supplier::ActiveModel> = new_suppliers
            .iter()
            .map(|s| order_supplier::ActiveModel {
                order_id: Set(order_id),
                supplier_id: Set(s.id),
                notified: Set(false),
            })
            .collect();
        order_supplier::Entity::insert_many(invitations)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        info!(
            order_id,
            added = new_suppliers.len(),
            "suppliers added to order"
        );
        self.emit(Event::SuppliersInvited {
            order_id,
            supplier_ids: new_suppliers.iter().map(|s| s.id).collect(),
        })
        .await;

        Ok((order, new_suppliers))
    }

    /// Mark the invitation rows for the given suppliers as notified.
    /// Best-effort bookkeeping after a notification round.
    pub async fn mark_notified(
        &self,
        order_id: i64,
        supplier_ids: &[i64],
    ) -> Result<(), ServiceError> {
        if supplier_ids.is_empty() {
            return Ok(());
        }
        order_supplier::Entity::update_many()
            .col_expr(order_supplier::Column::Notified, Expr::value(true))
            .filter(order_supplier::Column::OrderId.eq(order_id))
            .filter(order_supplier::Column::SupplierId.is_in(supplier_ids.to_vec()))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        Ok(())
    }
}
