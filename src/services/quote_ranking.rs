use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{
        quotation_request_line::{self, Entity as RequestLineEntity},
        supplier_quote::{self, Entity as SupplierQuoteEntity, SupplierQuoteStatus},
        supplier_quote_line::{self, Entity as QuoteLineEntity},
    },
    errors::ServiceError,
};

/// Derived ranking entry for one responded quote. Computed on demand and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRankEntry {
    pub quote_id: Uuid,
    pub supplier_id: Uuid,
    /// Sum over requested lines of unit_price x min(requested, available)
    pub total_amount: Decimal,
    /// Requested products the supplier actually quoted
    pub quoted_lines: usize,
    /// True when every requested product was quoted
    pub complete: bool,
    pub max_lead_time_days: i32,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Ranks responded quotes: complete quotes first, then ascending by total,
/// then earlier responses first. A cheap partial offer never outranks a
/// complete one.
pub fn rank(
    requested: &[quotation_request_line::Model],
    quotes: &[(supplier_quote::Model, Vec<supplier_quote_line::Model>)],
) -> Vec<QuoteRankEntry> {
    let requested_by_product: HashMap<Uuid, Decimal> = requested
        .iter()
        .map(|line| (line.product_id, line.suggested_quantity))
        .collect();

    let mut entries: Vec<QuoteRankEntry> = quotes
        .iter()
        .filter(|(quote, _)| quote.status == SupplierQuoteStatus::Responded)
        .map(|(quote, lines)| {
            let mut total = Decimal::ZERO;
            let mut quoted = 0usize;
            let mut max_lead = 0i32;
            for line in lines {
                let Some(&wanted) = requested_by_product.get(&line.product_id) else {
                    // supplier quoted something we did not ask for
                    continue;
                };
                quoted += 1;
                let quantity = wanted.min(line.quantity_available);
                total += line.unit_price * quantity;
                max_lead = max_lead.max(line.lead_time_days);
            }
            QuoteRankEntry {
                quote_id: quote.id,
                supplier_id: quote.supplier_id,
                total_amount: total,
                quoted_lines: quoted,
                complete: quoted >= requested_by_product.len(),
                max_lead_time_days: max_lead,
                responded_at: quote.responded_at,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.complete
            .cmp(&a.complete)
            .then_with(|| a.total_amount.cmp(&b.total_amount))
            .then_with(|| {
                let a_at = a.responded_at.unwrap_or(DateTime::<Utc>::MAX_UTC);
                let b_at = b.responded_at.unwrap_or(DateTime::<Utc>::MAX_UTC);
                a_at.cmp(&b_at)
            })
    });
    entries
}

/// Loads a request's responded quotes and computes the ranking.
#[derive(Clone)]
pub struct QuoteRankingService {
    db: Arc<DatabaseConnection>,
}

impl QuoteRankingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn rank_request(&self, request_id: Uuid) -> Result<Vec<QuoteRankEntry>, ServiceError> {
        let db = &*self.db;
        let requested = RequestLineEntity::find()
            .filter(quotation_request_line::Column::RequestId.eq(request_id))
            .all(db)
            .await?;
        if requested.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "quotation request {} has no lines",
                request_id
            )));
        }

        let quotes = SupplierQuoteEntity::find()
            .filter(supplier_quote::Column::RequestId.eq(request_id))
            .filter(supplier_quote::Column::Status.eq(SupplierQuoteStatus::Responded))
            .all(db)
            .await?;

        let mut loaded = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let lines = QuoteLineEntity::find()
                .filter(supplier_quote_line::Column::QuoteId.eq(quote.id))
                .all(db)
                .await?;
            loaded.push((quote, lines));
        }

        Ok(rank(&requested, &loaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn request_line(product_id: Uuid, quantity: Decimal) -> quotation_request_line::Model {
        quotation_request_line::Model {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            product_id,
            suggested_quantity: quantity,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn responded_quote(
        supplier_id: Uuid,
        responded_at: DateTime<Utc>,
    ) -> supplier_quote::Model {
        supplier_quote::Model {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            supplier_id,
            status: SupplierQuoteStatus::Responded,
            responded_at: Some(responded_at),
            rejection_reason: None,
            attempt: 1,
            processed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn quote_line(
        quote_id: Uuid,
        product_id: Uuid,
        price: Decimal,
        available: Decimal,
        lead: i32,
    ) -> supplier_quote_line::Model {
        supplier_quote_line::Model {
            id: Uuid::new_v4(),
            quote_id,
            product_id,
            unit_price: price,
            quantity_available: available,
            lead_time_days: lead,
            note: None,
            created_at: Utc::now(),
        }
    }

    /// Two requested lines (X qty 10, Y qty 5); supplier 1 quotes both at
    /// $10/$20, supplier 2 quotes only X at $9. Supplier 1 ranks first:
    /// a complete offer beats a cheaper partial one.
    #[test]
    fn complete_offer_outranks_cheaper_partial_one() {
        let product_x = Uuid::new_v4();
        let product_y = Uuid::new_v4();
        let requested = vec![
            request_line(product_x, dec!(10)),
            request_line(product_y, dec!(5)),
        ];

        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let q1 = responded_quote(s1, t0);
        let q2 = responded_quote(s2, t0 + chrono::Duration::hours(1));
        let q1_lines = vec![
            quote_line(q1.id, product_x, dec!(10), dec!(100), 3),
            quote_line(q1.id, product_y, dec!(20), dec!(100), 5),
        ];
        let q2_lines = vec![quote_line(q2.id, product_x, dec!(9), dec!(100), 2)];

        let ranked = rank(&requested, &[(q1, q1_lines), (q2, q2_lines)]);
        assert_eq!(ranked.len(), 2);
        // Supplier 1: $100 + $100 = $200, complete. Supplier 2: 10 x $9 = $90, incomplete.
        assert_eq!(ranked[0].supplier_id, s1);
        assert_eq!(ranked[0].total_amount, dec!(200));
        assert!(ranked[0].complete);
        assert_eq!(ranked[0].max_lead_time_days, 5);
        assert_eq!(ranked[1].supplier_id, s2);
        assert_eq!(ranked[1].total_amount, dec!(90));
        assert!(!ranked[1].complete);
    }

    #[test]
    fn complete_quotes_sort_by_total_then_response_time() {
        let product_x = Uuid::new_v4();
        let requested = vec![request_line(product_x, dec!(10))];

        let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let cheap = Uuid::new_v4();
        let pricey = Uuid::new_v4();
        let late_twin = Uuid::new_v4();
        let q_cheap = responded_quote(cheap, t0 + chrono::Duration::hours(2));
        let q_pricey = responded_quote(pricey, t0);
        let q_late_twin = responded_quote(late_twin, t0 + chrono::Duration::hours(3));
        let cheap_lines = vec![quote_line(q_cheap.id, product_x, dec!(5), dec!(100), 1)];
        let pricey_lines = vec![quote_line(q_pricey.id, product_x, dec!(8), dec!(100), 1)];
        let twin_lines = vec![quote_line(q_late_twin.id, product_x, dec!(5), dec!(100), 1)];

        let ranked = rank(
            &requested,
            &[
                (q_pricey, pricey_lines),
                (q_late_twin, twin_lines),
                (q_cheap, cheap_lines),
            ],
        );
        // $50 twins sort by earlier response; $80 comes last.
        assert_eq!(ranked[0].supplier_id, cheap);
        assert_eq!(ranked[1].supplier_id, late_twin);
        assert_eq!(ranked[2].supplier_id, pricey);
    }

    #[test]
    fn availability_caps_the_counted_quantity() {
        let product_x = Uuid::new_v4();
        let requested = vec![request_line(product_x, dec!(10))];
        let quote = responded_quote(Uuid::new_v4(), Utc::now());
        let lines = vec![quote_line(quote.id, product_x, dec!(10), dec!(4), 1)];
        let ranked = rank(&requested, &[(quote, lines)]);
        assert_eq!(ranked[0].total_amount, dec!(40));
    }

    #[test]
    fn non_responded_quotes_are_excluded() {
        let product_x = Uuid::new_v4();
        let requested = vec![request_line(product_x, dec!(10))];
        let mut quote = responded_quote(Uuid::new_v4(), Utc::now());
        quote.status = SupplierQuoteStatus::Sent;
        let lines = vec![quote_line(quote.id, product_x, dec!(10), dec!(10), 1)];
        assert!(rank(&requested, &[(quote, lines)]).is_empty());
    }
}
