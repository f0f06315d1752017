use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transport channel for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Channel {
    #[sea_orm(string_value = "Chat")]
    Chat,
    #[sea_orm(string_value = "Email")]
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Email => "email",
        }
    }
}

/// Aggregate a notification belongs to; drives the terminal-failure
/// callback when delivery attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum NotificationTargetKind {
    #[sea_orm(string_value = "SupplierQuote")]
    SupplierQuote,
    #[sea_orm(string_value = "PurchaseOrder")]
    PurchaseOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum NotificationStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Sent")]
    Sent,
    #[sea_orm(string_value = "Failed")]
    Failed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

/// Outbox record for one outbound message.
///
/// Written by the workflow in the same transaction as the state change that
/// caused it; the dispatcher only ever consumes these records, it never
/// creates them. Delivery is at-least-once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbound_notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub target_kind: NotificationTargetKind,
    pub target_id: Uuid,
    pub channel: Channel,
    pub address: String,
    pub subject: String,
    /// Body template with `{{variable}}` placeholders
    pub body_template: String,
    /// Variables bound at schedule time, rendered at dispatch time
    pub variables: Json,
    pub status: NotificationStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_eligible_at: DateTimeUtc,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTimeUtc>,
    /// Reference returned by the messaging provider on success
    pub provider_ref: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Cancelled
        )
    }

    /// Renders the body template, substituting `{{key}}` placeholders with
    /// the bound variables. Unknown placeholders are left as-is.
    pub fn render_body(&self) -> String {
        let mut body = self.body_template.clone();
        if let Some(map) = self.variables.as_object() {
            for (key, value) in map {
                let placeholder = format!("{{{{{}}}}}", key);
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                body = body.replace(&placeholder, &text);
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn notification(template: &str, vars: serde_json::Value) -> Model {
        Model {
            id: Uuid::new_v4(),
            target_kind: NotificationTargetKind::SupplierQuote,
            target_id: Uuid::new_v4(),
            channel: Channel::Email,
            address: "quotes@supplier.example".to_string(),
            subject: "Quotation request".to_string(),
            body_template: template.to_string(),
            variables: vars,
            status: NotificationStatus::Pending,
            attempts: 0,
            max_attempts: 3,
            next_eligible_at: Utc::now(),
            last_error: None,
            sent_at: None,
            provider_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn renders_bound_variables() {
        let n = notification(
            "Hello {{supplier}}, respond at {{link}}.",
            json!({"supplier": "Acme", "link": "https://example.test/q/abc"}),
        );
        assert_eq!(
            n.render_body(),
            "Hello Acme, respond at https://example.test/q/abc."
        );
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let n = notification("Code: {{code}}", json!({}));
        assert_eq!(n.render_body(), "Code: {{code}}");
    }
}
