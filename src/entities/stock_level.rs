use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cached on-hand quantity per product/location.
///
/// This row is a projection of the stock-movement ledger: `on_hand` must
/// always equal the `resulting_balance` of the latest movement for the same
/// product/location pair. Only the ledger append path mutates it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_levels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub on_hand: Decimal,
    /// Reorder trigger; zero disables monitoring for this row
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub reorder_threshold: Decimal,
    /// Quantity suggested on generated quotation-request lines
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub reorder_quantity: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_below_threshold(&self) -> bool {
        self.reorder_threshold > Decimal::ZERO && self.on_hand < self.reorder_threshold
    }
}
