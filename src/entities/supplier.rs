use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "suppliers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[validate(length(min = 1, max = 100, message = "Supplier name must be between 1 and 100 characters"))]
    pub name: String,

    /// Opaque random credential for the tokenized portal link. Presenting it
    /// is the supplier's sole authentication; generated from a CSPRNG and
    /// never serialized into buyer-facing lists by accident.
    #[sea_orm(unique)]
    pub access_token: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub webhook_url: Option<String>,

    pub user_id: i64,

    pub business_type: String,

    pub created_at: DateTime<Utc>,
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

/// Many-to-many: the orders this supplier has been invited to.
impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        super::order_supplier::Relation::Order.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::order_supplier::Relation::Supplier.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
