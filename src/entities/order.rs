use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lifecycle states for an order. Stored as plain strings, matching the
/// values exposed through the API.
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Human order number, `RX` + yymmdd + 3-digit sequence once final.
    /// Unique for the whole table; never rewritten after final assignment.
    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 50))]
    pub order_no: String,

    #[validate(length(min = 1, max = 200, message = "Warehouse must be between 1 and 200 characters"))]
    pub warehouse: String,

    #[sea_orm(column_type = "Text")]
    #[validate(length(min = 1))]
    pub goods: String,

    #[validate(length(
        min = 1,
        max = 300,
        message = "Delivery address must be between 1 and 300 characters"
    ))]
    pub delivery_address: String,

    /// `active`, `completed` or `cancelled`
    pub status: String,

    pub selected_supplier_id: Option<i64>,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub selected_price: Option<Decimal>,

    pub user_id: i64,

    pub business_type: String,

    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SelectedSupplierId",
        to = "super::supplier::Column::Id"
    )]
    SelectedSupplier,
    #[sea_orm(has_many = "super::quote::Entity")]
    Quotes,
    #[sea_orm(has_many = "super::order_supplier::Entity")]
    OrderSuppliers,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quotes.def()
    }
}

impl Related<super::order_supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderSuppliers.def()
    }
}

/// Many-to-many: the suppliers invited to quote on this order.
impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        super::order_supplier::Relation::Supplier.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::order_supplier::Relation::Order.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
