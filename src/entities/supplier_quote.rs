use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery/response state of one supplier's invitation.
///
/// `Responded` and `Rejected` are mutually exclusive terminal states; only
/// the explicit resend flow clears a quote back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SupplierQuoteStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Sent")]
    Sent,
    #[sea_orm(string_value = "Responded")]
    Responded,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "SendFailed")]
    SendFailed,
}

/// One supplier's invitation/response within a quotation request.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supplier_quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub request_id: Uuid,
    pub supplier_id: Uuid,
    pub status: SupplierQuoteStatus,
    pub responded_at: Option<DateTimeUtc>,
    pub rejection_reason: Option<String>,
    /// Invitation attempt; incremented by the resend flow
    pub attempt: i32,
    /// Set once a purchase order has been generated from this quote
    pub processed: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quotation_request::Entity",
        from = "Column::RequestId",
        to = "super::quotation_request::Column::Id"
    )]
    Request,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
    #[sea_orm(has_many = "super::supplier_quote_line::Entity")]
    Lines,
}

impl Related<super::quotation_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Request.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::supplier_quote_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SupplierQuoteStatus::Responded | SupplierQuoteStatus::Rejected
        )
    }
}
