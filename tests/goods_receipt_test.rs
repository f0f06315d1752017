mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::ConnectionTrait;
use uuid::Uuid;

use bottega_api::{
    entities::{
        goods_receipt::GoodsReceiptKind, purchase_order::PurchaseOrderStatus,
        supplier_quote::SupplierQuoteStatus,
    },
    errors::ServiceError,
    services::goods_receipts::ReceiptLine,
};
use common::TestApp;

/// Builds a Sent order over 20 bolts and returns (order_id, order_line_id,
/// product_id).
async fn sent_order(app: &TestApp) -> (Uuid, Uuid, Uuid) {
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(20))], &[supplier]).await;
    app.deliver_all().await;

    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    assert_eq!(quotes[0].status, SupplierQuoteStatus::Sent);
    app.respond(quotes[0].id, &[(bolts, dec!(2.00), dec!(20))]).await;

    let order = app
        .state
        .purchase_orders
        .generate_from_quote(quotes[0].id, None, None, "tester")
        .await
        .unwrap();
    app.deliver_all().await;

    let lines = app.state.purchase_orders.lines(order.id).await.unwrap();
    (order.id, lines[0].id, bolts)
}

/// 12 of 20 received, then an attempt at 9 more (only 8 pending), then the
/// remaining 8. Every step leaves ledger and cache in agreement.
#[tokio::test]
async fn partial_then_over_then_total_receipt() {
    let app = TestApp::new().await;
    let (order_id, line_id, bolts) = sent_order(&app).await;
    let location = Uuid::new_v4();

    let first = app
        .state
        .goods_receipts
        .receive(
            order_id,
            location,
            vec![ReceiptLine {
                order_line_id: line_id,
                quantity: dec!(12),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await
        .unwrap();
    assert_eq!(first.kind, GoodsReceiptKind::Partial);

    let order = app.state.purchase_orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::PartiallyReceived);
    assert_eq!(app.ledger().on_hand(bolts, location).await.unwrap(), dec!(12));
    assert!(app.ledger().is_consistent(bolts, location).await.unwrap());

    let over = app
        .state
        .goods_receipts
        .receive(
            order_id,
            location,
            vec![ReceiptLine {
                order_line_id: line_id,
                quantity: dec!(9),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await;
    assert_matches!(
        over,
        Err(ServiceError::OverReceipt { pending, requested, .. })
            if pending == dec!(8) && requested == dec!(9)
    );
    // The rejected receipt must not have moved stock.
    assert_eq!(app.ledger().on_hand(bolts, location).await.unwrap(), dec!(12));

    let second = app
        .state
        .goods_receipts
        .receive(
            order_id,
            location,
            vec![ReceiptLine {
                order_line_id: line_id,
                quantity: dec!(8),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await
        .unwrap();
    assert_eq!(second.kind, GoodsReceiptKind::Total);

    let order = app.state.purchase_orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::FullyReceived);
    assert_eq!(app.ledger().on_hand(bolts, location).await.unwrap(), dec!(20));
    assert!(app.ledger().is_consistent(bolts, location).await.unwrap());

    // A fully received order takes no further deliveries.
    let closed = app
        .state
        .goods_receipts
        .receive(
            order_id,
            location,
            vec![ReceiptLine {
                order_line_id: line_id,
                quantity: dec!(1),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await;
    assert_matches!(closed, Err(ServiceError::InvalidState(_)));

    let receipts = app.state.goods_receipts.for_order(order_id).await.unwrap();
    assert_eq!(receipts.len(), 2, "rejected receipts leave no record");
}

/// A failing stock append must not take the receipt down with it. The
/// append runs in its own savepoint, so even on backends that abort the
/// whole transaction after a failed statement the receipt, its lines,
/// and the order status advance still commit.
#[tokio::test]
async fn receipt_survives_a_failed_stock_append() {
    let app = TestApp::new().await;
    let (order_id, line_id, _) = sent_order(&app).await;

    // Make every ledger append fail from here on.
    app.state
        .db
        .execute_unprepared("DROP TABLE stock_movements")
        .await
        .unwrap();

    let receipt = app
        .state
        .goods_receipts
        .receive(
            order_id,
            Uuid::new_v4(),
            vec![ReceiptLine {
                order_line_id: line_id,
                quantity: dec!(20),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await
        .unwrap();
    assert_eq!(receipt.kind, GoodsReceiptKind::Total);

    let stored = app.state.goods_receipts.get(receipt.id).await.unwrap();
    assert!(stored.is_some(), "receipt committed despite the failed append");
    let receipt_lines = app.state.goods_receipts.lines(receipt.id).await.unwrap();
    assert_eq!(receipt_lines.len(), 1);
    assert_eq!(receipt_lines[0].quantity, dec!(20));

    let order_line = &app.state.purchase_orders.lines(order_id).await.unwrap()[0];
    assert_eq!(order_line.quantity_received, dec!(20));
    let order = app.state.purchase_orders.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::FullyReceived);
}

#[tokio::test]
async fn negative_quantity_is_rejected() {
    let app = TestApp::new().await;
    let (order_id, line_id, _) = sent_order(&app).await;

    let result = app
        .state
        .goods_receipts
        .receive(
            order_id,
            Uuid::new_v4(),
            vec![ReceiptLine {
                order_line_id: line_id,
                quantity: dec!(-3),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await;
    assert_matches!(result, Err(ServiceError::NegativeQuantity { .. }));
}

#[tokio::test]
async fn draft_order_is_not_receivable() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(5))], &[supplier]).await;
    app.deliver_all().await;
    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    app.respond(quotes[0].id, &[(bolts, dec!(1.00), dec!(5))]).await;
    let order = app
        .state
        .purchase_orders
        .generate_from_quote(quotes[0].id, None, None, "tester")
        .await
        .unwrap();
    // No dispatch: the order is still Draft.
    let line = &app.state.purchase_orders.lines(order.id).await.unwrap()[0];

    let result = app
        .state
        .goods_receipts
        .receive(
            order.id,
            Uuid::new_v4(),
            vec![ReceiptLine {
                order_line_id: line.id,
                quantity: dec!(5),
                note: None,
            }],
            None,
            "magazzino",
        )
        .await;
    assert_matches!(result, Err(ServiceError::InvalidState(_)));
}
