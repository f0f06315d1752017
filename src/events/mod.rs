use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the procurement workflow.
///
/// Asynchronous failures never propagate to interactive callers; they are
/// recorded on the affected records and surfaced here for operational
/// consumers (alerting, dashboards).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Quotation request lifecycle
    QuotationRequestOpened(Uuid),
    QuotationRequestSent { request_id: Uuid, invitations: usize },
    QuotationRequestClosed(Uuid),
    QuotationRequestCancelled(Uuid),
    QuotationRequestExpired(Uuid),

    // Supplier quote lifecycle
    SupplierQuoteResponded { quote_id: Uuid, request_id: Uuid },
    SupplierQuoteRejected { quote_id: Uuid, request_id: Uuid },
    SupplierQuoteResent { quote_id: Uuid, attempt: i32 },
    SupplierQuoteSendFailed { quote_id: Uuid },

    // Purchase order lifecycle
    PurchaseOrderGenerated {
        order_id: Uuid,
        quote_id: Uuid,
        supplier_id: Uuid,
        total_amount: Decimal,
    },
    PurchaseOrderSent(Uuid),
    PurchaseOrderSendFailed(Uuid),

    // Goods receipt / stock
    GoodsReceiptRecorded {
        receipt_id: Uuid,
        order_id: Uuid,
        total: bool,
    },
    StockMovementAppended {
        product_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
        resulting_balance: Decimal,
    },

    // Recoverable incidents for manual remediation
    StockUpdateFailed {
        receipt_id: Uuid,
        order_line_id: Uuid,
        detail: String,
    },
    OrderStatusUpdateFailed {
        order_id: Uuid,
        detail: String,
    },
    AuditWriteFailed {
        aggregate_id: Uuid,
        detail: String,
    },
    NotificationFailed {
        notification_id: Uuid,
        attempts: i32,
        detail: String,
    },

    // Stock monitor
    StockBelowThreshold {
        product_id: Uuid,
        location_id: Uuid,
        on_hand: Decimal,
        threshold: Decimal,
    },
    ProductUnprocessable {
        product_id: Uuid,
        reason: String,
    },
}

/// Cloneable handle for emitting events into the in-process channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Emits the event, logging instead of failing when the channel is
    /// closed or full. Event delivery is best-effort.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("event dropped: {}", e);
        }
    }
}

/// Creates the event channel plus a logging consumer task.
pub fn channel(buffer: usize) -> (EventSender, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(buffer);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(?event, "domain event");
        }
    });
    (EventSender::new(tx), handle)
}
