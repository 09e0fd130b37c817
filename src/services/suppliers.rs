use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{order, quote, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Generate a fresh opaque portal credential: 32 bytes from the OS CSPRNG,
/// URL-safe base64 without padding (43 characters).
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 100, message = "Supplier name must be between 1 and 100 characters"))]
    pub name: String,
    pub webhook_url: Option<String>,
    /// Admins may create suppliers in any partition; others are pinned to
    /// their own and this field is ignored.
    pub business_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 100, message = "Supplier name must be between 1 and 100 characters"))]
    pub name: String,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SupplierResponse {
    pub id: i64,
    pub name: String,
    pub webhook_url: Option<String>,
    pub user_id: i64,
    pub business_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<supplier::Model> for SupplierResponse {
    fn from(model: supplier::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            webhook_url: model.webhook_url,
            user_id: model.user_id,
            business_type: model.business_type,
            created_at: model.created_at,
        }
    }
}

/// Service for vendor records and their portal credentials.
#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl SupplierService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!(error = %e, "failed to send supplier event");
            }
        }
    }

    async fn visible_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: i64,
    ) -> Result<supplier::Model, ServiceError> {
        actor
            .scope()
            .apply(
                supplier::Entity::find_by_id(supplier_id),
                supplier::Column::BusinessType,
            )
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("supplier {} not found", supplier_id))
            })
    }

    async fn name_taken(
        &self,
        name: &str,
        business_type: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, ServiceError> {
        let mut query = supplier::Entity::find()
            .filter(supplier::Column::Name.eq(name))
            .filter(supplier::Column::BusinessType.eq(business_type));
        if let Some(id) = exclude_id {
            query = query.filter(supplier::Column::Id.ne(id));
        }
        let count = query.count(&*self.db).await.map_err(ServiceError::from_db)?;
        Ok(count > 0)
    }

    /// Create a supplier with a freshly generated portal token.
    #[instrument(skip(self, request), fields(user_id = actor.user_id))]
    pub async fn create_supplier(
        &self,
        actor: &AuthUser,
        request: CreateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        let name = request.name.trim().to_string();
        let normalized = CreateSupplierRequest {
            name: name.clone(),
            ..request
        };
        normalized
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let scope = actor.scope();
        let business_type =
            scope.resolve_tag(normalized.business_type.as_deref(), &actor.business_type);

        // Friendly duplicate message; the unique (name, business_type) index
        // still backstops the race.
        if self.name_taken(&name, &business_type, None).await? {
            return Err(ServiceError::Conflict(format!(
                "supplier \"{}\" already exists in this partition",
                name
            )));
        }

        let webhook_url = normalized
            .webhook_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let created = supplier::ActiveModel {
            name: Set(name),
            access_token: Set(generate_access_token()),
            webhook_url: Set(webhook_url),
            user_id: Set(actor.user_id),
            business_type: Set(business_type),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(supplier_id = created.id, name = %created.name, "supplier created");
        self.emit(Event::SupplierCreated(created.id)).await;
        Ok(created)
    }

    /// List suppliers visible to the actor, alphabetically.
    pub async fn list_suppliers(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        actor
            .scope()
            .apply(supplier::Entity::find(), supplier::Column::BusinessType)
            .order_by_asc(supplier::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)
    }

    /// Retrieve one supplier (scope-checked), including the portal token.
    pub async fn get_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: i64,
    ) -> Result<supplier::Model, ServiceError> {
        self.visible_supplier(actor, supplier_id).await
    }

    /// Update a supplier's name and webhook URL.
    #[instrument(skip(self, request), fields(supplier_id))]
    pub async fn update_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: i64,
        request: UpdateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        let name = request.name.trim().to_string();
        let normalized = UpdateSupplierRequest {
            name: name.clone(),
            webhook_url: request.webhook_url,
        };
        normalized
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let supplier = self.visible_supplier(actor, supplier_id).await?;

        if self
            .name_taken(&name, &supplier.business_type, Some(supplier.id))
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "supplier \"{}\" already exists in this partition",
                name
            )));
        }

        let webhook_url = normalized
            .webhook_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let updated = supplier::ActiveModel {
            id: Set(supplier.id),
            name: Set(name),
            webhook_url: Set(webhook_url),
            ..Default::default()
        }
        .update(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(supplier_id, "supplier updated");
        Ok(updated)
    }

    /// Delete a supplier. Refused while quotes reference it.
    #[instrument(skip(self), fields(supplier_id))]
    pub async fn delete_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: i64,
    ) -> Result<(), ServiceError> {
        let supplier = self.visible_supplier(actor, supplier_id).await?;

        let quote_count = quote::Entity::find()
            .filter(quote::Column::SupplierId.eq(supplier.id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        if quote_count > 0 {
            return Err(ServiceError::InvalidOperation(
                "supplier has quotes on record and cannot be deleted".into(),
            ));
        }

        let id = supplier.id;
        supplier
            .delete(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        info!(supplier_id = id, "supplier deleted");
        self.emit(Event::SupplierDeleted(id)).await;
        Ok(())
    }

    /// Rotate the supplier's portal token, invalidating the previous link.
    #[instrument(skip(self), fields(supplier_id))]
    pub async fn regenerate_token(
        &self,
        actor: &AuthUser,
        supplier_id: i64,
    ) -> Result<supplier::Model, ServiceError> {
        let supplier = self.visible_supplier(actor, supplier_id).await?;

        let updated = supplier::ActiveModel {
            id: Set(supplier.id),
            access_token: Set(generate_access_token()),
            ..Default::default()
        }
        .update(&*self.db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(supplier_id, "supplier access token rotated");
        self.emit(Event::SupplierTokenRotated(supplier_id)).await;
        Ok(updated)
    }

    /// Resolve a portal token to its supplier. The token is the supplier's
    /// sole credential.
    pub async fn find_by_token(
        &self,
        access_token: &str,
    ) -> Result<Option<supplier::Model>, ServiceError> {
        supplier::Entity::find()
            .filter(supplier::Column::AccessToken.eq(access_token))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)
    }

    /// Active orders this supplier has been invited to (portal dashboard).
    pub async fn active_orders_for(
        &self,
        supplier: &supplier::Model,
    ) -> Result<Vec<order::Model>, ServiceError> {
        supplier
            .find_related(order::Entity)
            .filter(order::Column::Status.eq(order::STATUS_ACTIVE))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)
    }

    /// One order, only if this supplier was invited to it (portal detail).
    pub async fn order_for_supplier(
        &self,
        supplier: &supplier::Model,
        order_id: i64,
    ) -> Result<Option<order::Model>, ServiceError> {
        supplier
            .find_related(order::Entity)
            .filter(order::Column::Id.eq(order_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)
    }
}
