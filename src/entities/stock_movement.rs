use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum StockMovementKind {
    #[sea_orm(string_value = "Inbound")]
    Inbound,
    #[sea_orm(string_value = "Outbound")]
    Outbound,
    #[sea_orm(string_value = "AdjustmentPositive")]
    AdjustmentPositive,
    #[sea_orm(string_value = "AdjustmentNegative")]
    AdjustmentNegative,
}

/// One immutable entry in the inventory ledger.
///
/// The ledger is the source of truth for on-hand quantities: entries are
/// appended once and never edited or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    /// Signed quantity; positive for inbound, negative for outbound
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    /// Balance for the product/location after applying this movement
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub resulting_balance: Decimal,
    pub kind: StockMovementKind,
    /// Originating aggregate (e.g., "GoodsReceipt", "Sale")
    pub reference_kind: Option<String>,
    pub reference_id: Option<Uuid>,
    pub occurred_at: DateTimeUtc,
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
    pub fn is_inbound(&self) -> bool {
        matches!(
            self.kind,
            StockMovementKind::Inbound | StockMovementKind::AdjustmentPositive
        )
    }
}
