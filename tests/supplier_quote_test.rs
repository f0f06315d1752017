mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use bottega_api::{
    entities::supplier_quote::SupplierQuoteStatus, errors::ServiceError,
};
use common::TestApp;

/// A rejection needs a reason, marks the quote `Rejected`, and drops it
/// from the ranking; once rejected the quote takes no further answers.
#[tokio::test]
async fn rejection_needs_a_reason_and_leaves_the_ranking() {
    let app = TestApp::new().await;
    let supplier_a = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let supplier_b = app.seed_supplier("Bianchi SRL", Some("bianchi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app
        .sent_request(&[(bolts, dec!(50))], &[supplier_a, supplier_b])
        .await;
    app.deliver_all().await;

    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    let quote_a = quotes.iter().find(|q| q.supplier_id == supplier_a).unwrap();
    let quote_b = quotes.iter().find(|q| q.supplier_id == supplier_b).unwrap();

    let blank = app
        .state
        .supplier_quotes
        .register_rejection(quote_b.id, "   ".to_string())
        .await;
    assert_matches!(blank, Err(ServiceError::ValidationError(_)));
    let untouched = app.state.supplier_quotes.get(quote_b.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, SupplierQuoteStatus::Sent);

    app.respond(quote_a.id, &[(bolts, dec!(0.10), dec!(50))]).await;
    let rejected = app
        .state
        .supplier_quotes
        .register_rejection(quote_b.id, "no stock until June".to_string())
        .await
        .unwrap();
    assert_eq!(rejected.status, SupplierQuoteStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("no stock until June"));
    assert!(rejected.responded_at.is_some());

    let ranking = app.state.quote_ranking.rank_request(request_id).await.unwrap();
    assert_eq!(ranking.len(), 1, "rejected quotes do not rank");
    assert_eq!(ranking[0].quote_id, quote_a.id);

    // A rejected quote is no longer Sent and takes no second answer.
    let again = app
        .state
        .supplier_quotes
        .register_rejection(quote_b.id, "changed my mind".to_string())
        .await;
    assert_matches!(again, Err(ServiceError::InvalidState(_)));
}

/// Resending wipes the previous answer, bumps the attempt, and puts the
/// quote back on the outbox via the next `send` on the request.
#[tokio::test]
async fn resend_opens_a_fresh_attempt() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(10))], &[supplier]).await;
    app.deliver_all().await;
    assert_eq!(app.gateway.sent_count(), 1);

    let quote_id = app.state.supplier_quotes.for_request(request_id).await.unwrap()[0].id;
    app.respond(quote_id, &[(bolts, dec!(2.00), dec!(10))]).await;

    let resent = app.state.supplier_quotes.resend(quote_id).await.unwrap();
    assert_eq!(resent.status, SupplierQuoteStatus::Pending);
    assert_eq!(resent.attempt, 2);
    assert!(resent.responded_at.is_none());
    assert!(resent.rejection_reason.is_none());
    let lines = app.state.supplier_quotes.lines(quote_id).await.unwrap();
    assert!(lines.is_empty(), "previous answer belongs to the old attempt");

    // Already pending: nothing to resend.
    let twice = app.state.supplier_quotes.resend(quote_id).await;
    assert_matches!(twice, Err(ServiceError::InvalidState(_)));

    // The next send re-invites the pending quote.
    app.state.quotation_requests.send(request_id).await.unwrap();
    app.deliver_all().await;
    assert_eq!(app.gateway.sent_count(), 2);
    let quote = app.state.supplier_quotes.get(quote_id).await.unwrap().unwrap();
    assert_eq!(quote.status, SupplierQuoteStatus::Sent);

    // The supplier can answer the new attempt.
    app.respond(quote_id, &[(bolts, dec!(1.80), dec!(10))]).await;
    let quote = app.state.supplier_quotes.get(quote_id).await.unwrap().unwrap();
    assert_eq!(quote.status, SupplierQuoteStatus::Responded);
}

/// Quotes stay put once they produced an order or their request ended.
#[tokio::test]
async fn resend_blocked_for_processed_quotes_and_finished_requests() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(10))], &[supplier]).await;
    app.deliver_all().await;

    let quote_id = app.state.supplier_quotes.for_request(request_id).await.unwrap()[0].id;
    app.respond(quote_id, &[(bolts, dec!(2.00), dec!(10))]).await;
    app.state
        .purchase_orders
        .generate_from_quote(quote_id, None, None, "tester")
        .await
        .unwrap();

    let processed = app.state.supplier_quotes.resend(quote_id).await;
    assert_matches!(processed, Err(ServiceError::InvalidState(_)));

    app.state.quotation_requests.close(request_id).await.unwrap();
    let closed = app.state.supplier_quotes.resend(quote_id).await;
    assert_matches!(closed, Err(ServiceError::InvalidState(_)));
}
