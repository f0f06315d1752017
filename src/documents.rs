use async_trait::async_trait;
use thiserror::Error;

use crate::entities::{purchase_order, purchase_order_line};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Best-effort order-document renderer. Failures are logged and retried by
/// the post-commit task queue; they never block order creation.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_order_document(
        &self,
        order: &purchase_order::Model,
        lines: &[purchase_order_line::Model],
    ) -> Result<Vec<u8>, RenderError>;
}

/// Plain-text renderer used until a real PDF backend is configured.
#[derive(Debug, Default)]
pub struct PlainTextRenderer;

#[async_trait]
impl DocumentRenderer for PlainTextRenderer {
    async fn render_order_document(
        &self,
        order: &purchase_order::Model,
        lines: &[purchase_order_line::Model],
    ) -> Result<Vec<u8>, RenderError> {
        let mut out = format!(
            "PURCHASE ORDER {}\nIssued: {}\nTotal: {}\n\n",
            order.code(),
            order.issued_on.format("%Y-%m-%d"),
            order.total_amount
        );
        for line in lines {
            out.push_str(&format!(
                "  product {}  qty {}  @ {}\n",
                line.product_id, line.quantity_ordered, line.unit_price
            ));
        }
        Ok(out.into_bytes())
    }
}
