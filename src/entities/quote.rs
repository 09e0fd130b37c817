use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound for a quoted price (matches the 12,2 column definition).
pub const MAX_PRICE: &str = "9999999999.99";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub order_id: i64,

    pub supplier_id: i64,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,

    pub delivery_time: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub remarks: Option<String>,

    /// Refreshed whenever the supplier re-submits; a quote is upserted per
    /// (order, supplier), not duplicated.
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Price bounds shared by portal submission and winner selection.
    pub fn price_in_bounds(price: Decimal) -> bool {
        price > Decimal::ZERO && price <= MAX_PRICE.parse::<Decimal>().unwrap_or(Decimal::MAX)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id",
        on_delete = "Cascade"
    )]
    Supplier,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_bounds() {
        assert!(Model::price_in_bounds(dec!(0.01)));
        assert!(Model::price_in_bounds(dec!(9999999999.99)));
        assert!(!Model::price_in_bounds(Decimal::ZERO));
        assert!(!Model::price_in_bounds(dec!(-1)));
        assert!(!Model::price_in_bounds(dec!(10000000000.00)));
    }
}
