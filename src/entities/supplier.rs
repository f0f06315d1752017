use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A supplier reachable through one or more notification channels.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suppliers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// Chat handle for the chat channel, if the supplier has one
    pub chat_address: Option<String>,
    /// Email address for the email channel, if the supplier has one
    pub email_address: Option<String>,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::supplier_quote::Entity")]
    SupplierQuotes,
}

impl Related<super::supplier_quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupplierQuotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Address for the given channel, if the supplier is reachable on it.
    pub fn address_for(&self, channel: super::outbound_notification::Channel) -> Option<&str> {
        match channel {
            super::outbound_notification::Channel::Chat => self.chat_address.as_deref(),
            super::outbound_notification::Channel::Email => self.email_address.as_deref(),
        }
    }
}
