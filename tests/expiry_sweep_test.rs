mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use bottega_api::{
    entities::{
        outbound_notification::{NotificationStatus, NotificationTargetKind},
        quotation_request::QuotationRequestStatus,
    },
    errors::ServiceError,
    services::supplier_quotes::ResponseLine,
};
use common::TestApp;

/// The sweep expires overdue Sent requests, cancels their undelivered
/// invitations, and late responses are turned away with a closed-window
/// error.
#[tokio::test]
async fn overdue_request_expires_and_closes_the_response_window() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(10))], &[supplier]).await;
    let quote = app.state.supplier_quotes.for_request(request_id).await.unwrap()[0].clone();

    // 7-day validity; nothing to expire yet.
    let expired = app
        .state
        .quotation_requests
        .expire_due(Utc::now())
        .await
        .unwrap();
    assert_eq!(expired, 0);

    let after_deadline = Utc::now() + Duration::days(8);
    let expired = app
        .state
        .quotation_requests
        .expire_due(after_deadline)
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let request = app
        .state
        .quotation_requests
        .get(request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, QuotationRequestStatus::Expired);

    // The invitation was never dispatched and is withdrawn with the request.
    let notifications = app
        .state
        .dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote.id)
        .await
        .unwrap();
    assert!(notifications
        .iter()
        .all(|n| n.status == NotificationStatus::Cancelled));

    let result = app
        .state
        .supplier_quotes
        .register_response(
            quote.id,
            vec![ResponseLine {
                product_id: bolts,
                unit_price: dec!(1.10),
                quantity_available: dec!(10),
                lead_time_days: 4,
                note: None,
            }],
        )
        .await;
    assert_matches!(result, Err(ServiceError::ResponseWindowClosed(_)));

    // Idempotent: a second sweep finds nothing.
    let expired = app
        .state
        .quotation_requests
        .expire_due(after_deadline)
        .await
        .unwrap();
    assert_eq!(expired, 0);
}
