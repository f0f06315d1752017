mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use bottega_api::{
    entities::{
        purchase_order::PurchaseOrderStatus, quotation_request::QuotationRequestStatus,
        supplier_quote::SupplierQuoteStatus,
    },
    errors::ServiceError,
};
use common::TestApp;

/// End-to-end: shortfall request -> invitations delivered -> responses ->
/// ranking -> purchase order, with the 1:1 lock on the chosen quote.
#[tokio::test]
async fn full_quotation_to_order_flow() {
    let app = TestApp::new().await;
    let supplier_a = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let supplier_b = app.seed_supplier("Bianchi SRL", Some("bianchi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let nuts = app.seed_product("NUT-M6", None).await;

    let request_id = app
        .sent_request(
            &[(bolts, dec!(100)), (nuts, dec!(50))],
            &[supplier_a, supplier_b],
        )
        .await;

    // Invitations ride the outbox; nothing reaches the gateway until the
    // dispatcher runs.
    assert_eq!(app.gateway.sent_count(), 0);
    app.deliver_all().await;
    assert_eq!(app.gateway.sent_count(), 2);
    let invite = &app.gateway.sent_messages()[0];
    assert!(invite.body.contains("/quotes/"), "invitation carries the magic link");

    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    assert!(quotes.iter().all(|q| q.status == SupplierQuoteStatus::Sent));
    let quote_a = quotes.iter().find(|q| q.supplier_id == supplier_a).unwrap();
    let quote_b = quotes.iter().find(|q| q.supplier_id == supplier_b).unwrap();

    // A quotes everything, B only the bolts but cheaper.
    app.respond(
        quote_a.id,
        &[(bolts, dec!(0.10), dec!(100)), (nuts, dec!(0.05), dec!(50))],
    )
    .await;
    app.respond(quote_b.id, &[(bolts, dec!(0.08), dec!(100))]).await;

    let ranking = app.state.quote_ranking.rank_request(request_id).await.unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].quote_id, quote_a.id, "complete offer ranks first");
    assert!(ranking[0].complete);
    assert!(!ranking[1].complete);

    let order = app
        .state
        .purchase_orders
        .generate_from_quote(quote_a.id, None, None, "tester")
        .await
        .unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::Draft);
    assert_eq!(order.total_amount, dec!(12.50));
    assert_eq!(order.code(), format!("PO-{:06}", order.number));

    let lines = app.state.purchase_orders.lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| !l.price_estimated));

    // Second generation from the same quote must hit the 1:1 guard.
    let second = app
        .state
        .purchase_orders
        .generate_from_quote(quote_a.id, None, None, "tester")
        .await;
    assert_matches!(second, Err(ServiceError::Conflict(_)));

    // The order notification is in the outbox; delivering it moves the
    // order to Sent.
    app.deliver_all().await;
    let order = app.state.purchase_orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::Sent);

    app.state.quotation_requests.close(request_id).await.unwrap();
    let request = app.state.quotation_requests.get(request_id).await.unwrap().unwrap();
    assert_eq!(request.status, QuotationRequestStatus::Closed);
}

/// Codes derive from the highest existing code, so deleting an old
/// request never makes a later create collide on the unique code index.
#[tokio::test]
async fn request_codes_survive_deletions_without_colliding() {
    let app = TestApp::new().await;
    let expires = chrono::Utc::now() + chrono::Duration::days(7);

    let first = app.state.quotation_requests.create(expires, None, vec![]).await.unwrap();
    let second = app.state.quotation_requests.create(expires, None, vec![]).await.unwrap();
    assert_eq!(first.code, "QR-000001");
    assert_eq!(second.code, "QR-000002");

    use sea_orm::EntityTrait;
    bottega_api::entities::quotation_request::Entity::delete_by_id(first.id)
        .exec(&*app.state.db)
        .await
        .unwrap();

    let third = app.state.quotation_requests.create(expires, None, vec![]).await.unwrap();
    assert_eq!(third.code, "QR-000003", "gap left by the deletion is not reused");
}

#[tokio::test]
async fn response_rejected_once_quote_is_terminal() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(10))], &[supplier]).await;
    app.deliver_all().await;

    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    app.respond(quotes[0].id, &[(bolts, dec!(1.00), dec!(10))]).await;

    // A second response through a reused magic link.
    let again = app
        .state
        .supplier_quotes
        .register_response(
            quotes[0].id,
            vec![bottega_api::services::supplier_quotes::ResponseLine {
                product_id: bolts,
                unit_price: dec!(0.90),
                quantity_available: dec!(10),
                lead_time_days: 3,
                note: None,
            }],
        )
        .await;
    assert_matches!(again, Err(ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn degraded_path_splits_declared_total_evenly() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let nuts = app.seed_product("NUT-M6", None).await;
    let request_id = app
        .sent_request(&[(bolts, dec!(10)), (nuts, dec!(20))], &[supplier])
        .await;
    app.deliver_all().await;

    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    let quote_id = quotes[0].id;
    app.respond(quote_id, &[(bolts, dec!(1.00), dec!(10))]).await;

    // Strip the structured lines to force the legacy fallback.
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    bottega_api::entities::supplier_quote_line::Entity::delete_many()
        .filter(bottega_api::entities::supplier_quote_line::Column::QuoteId.eq(quote_id))
        .exec(&*app.state.db)
        .await
        .unwrap();

    // Without a declared total the fallback has nothing to split.
    let missing = app
        .state
        .purchase_orders
        .generate_from_quote(quote_id, None, None, "tester")
        .await;
    assert_matches!(missing, Err(ServiceError::ValidationError(_)));

    let order = app
        .state
        .purchase_orders
        .generate_from_quote(quote_id, Some(dec!(30.00)), None, "tester")
        .await
        .unwrap();
    let lines = app.state.purchase_orders.lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.price_estimated));
    // 30.00 split over two lines: 15.00 each, divided by the quantities.
    let bolt_line = lines.iter().find(|l| l.product_id == bolts).unwrap();
    assert_eq!(bolt_line.unit_price, dec!(1.5));
    let nut_line = lines.iter().find(|l| l.product_id == nuts).unwrap();
    assert_eq!(nut_line.unit_price, dec!(0.75));
}
