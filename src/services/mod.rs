pub mod goods_receipts;
pub mod notification_dispatcher;
pub mod post_commit_tasks;
pub mod purchase_orders;
pub mod quotation_requests;
pub mod quote_ranking;
pub mod stock_ledger;
pub mod stock_monitor;
pub mod supplier_quotes;

pub use goods_receipts::GoodsReceiptService;
pub use notification_dispatcher::NotificationDispatcher;
pub use post_commit_tasks::PostCommitTaskService;
pub use purchase_orders::PurchaseOrderService;
pub use quotation_requests::QuotationRequestService;
pub use quote_ranking::QuoteRankingService;
pub use stock_ledger::StockLedgerService;
pub use stock_monitor::StockMonitorService;
pub use supplier_quotes::SupplierQuoteService;
