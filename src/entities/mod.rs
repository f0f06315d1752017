pub mod audit_log;
pub mod goods_receipt;
pub mod goods_receipt_line;
pub mod outbound_notification;
pub mod post_commit_task;
pub mod product;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod quotation_request;
pub mod quotation_request_line;
pub mod stock_level;
pub mod stock_movement;
pub mod supplier;
pub mod supplier_quote;
pub mod supplier_quote_line;
