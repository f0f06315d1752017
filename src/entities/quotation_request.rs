use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a quotation request.
///
/// `Expired` and `Cancelled` are side exits; `Closed` is the normal end of
/// the workflow after a purchase order has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum QuotationRequestStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Open")]
    Open,
    #[sea_orm(string_value = "Sent")]
    Sent,
    #[sea_orm(string_value = "Closed")]
    Closed,
    #[sea_orm(string_value = "Expired")]
    Expired,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

/// A request for price quotes on a set of products, addressed to one or
/// more suppliers. Never physically deleted; cancelled instead.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotation_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable code, e.g. "QR-000123"
    #[sea_orm(unique)]
    pub code: String,
    pub status: QuotationRequestStatus,
    pub issued_on: DateTimeUtc,
    pub expires_at: DateTimeUtc,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quotation_request_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::supplier_quote::Entity")]
    SupplierQuotes,
}

impl Related<super::quotation_request_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::supplier_quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupplierQuotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Requests in a terminal state accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            QuotationRequestStatus::Closed
                | QuotationRequestStatus::Expired
                | QuotationRequestStatus::Cancelled
        )
    }

    /// The expiry sweep only touches Open and Sent requests.
    pub fn is_expirable(&self, now: DateTimeUtc) -> bool {
        matches!(
            self.status,
            QuotationRequestStatus::Open | QuotationRequestStatus::Sent
        ) && now > self.expires_at
    }
}
