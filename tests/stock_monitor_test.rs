mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use bottega_api::entities::quotation_request::QuotationRequestStatus;
use common::{seed, TestApp};

/// A shortfall with no preferred supplier and no active supplier to fall
/// back on is reported as unprocessable, not silently dropped.
#[tokio::test]
async fn shortfall_without_any_supplier_is_reported_unprocessable() {
    let app = TestApp::new().await;
    let location = Uuid::new_v4();
    let washers = app.seed_product("WASHER-M6", None).await;
    seed::stock_level(&app.state, washers, location, dec!(2), dec!(10), dec!(50)).await;
    // The only supplier on file is inactive.
    app.seed_supplier_with("Dormant Srl", Some("dormant@example.test"), false)
        .await;

    let report = app.state.stock_monitor.run().await.unwrap();

    assert_eq!(report.below_threshold, 1);
    assert!(report.requests_created.is_empty());
    assert_eq!(report.unprocessable.len(), 1);
    assert_eq!(report.unprocessable[0].0, washers);

    let open = app
        .state
        .quotation_requests
        .list_by_status(QuotationRequestStatus::Open)
        .await
        .unwrap();
    assert!(open.is_empty());
}

/// An inactive preferred supplier blocks the product instead of silently
/// rerouting it to other suppliers.
#[tokio::test]
async fn inactive_preferred_supplier_blocks_the_product() {
    let app = TestApp::new().await;
    let location = Uuid::new_v4();
    let dormant = app
        .seed_supplier_with("Dormant Srl", Some("dormant@example.test"), false)
        .await;
    app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let washers = app.seed_product("WASHER-M6", Some(dormant)).await;
    seed::stock_level(&app.state, washers, location, dec!(2), dec!(10), dec!(50)).await;

    let report = app.state.stock_monitor.run().await.unwrap();

    assert!(report.requests_created.is_empty());
    assert_eq!(report.unprocessable.len(), 1);
    assert!(report.unprocessable[0].1.contains("inactive"));
}

/// Shortfalls group by preferred supplier: one request per preferred
/// supplier, and products without one go to every active supplier.
#[tokio::test]
async fn shortfalls_group_by_preferred_supplier() {
    let app = TestApp::new().await;
    let location = Uuid::new_v4();
    let rossi = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bianchi = app
        .seed_supplier("Bianchi SpA", Some("bianchi@example.test"))
        .await;

    let bolts = app.seed_product("BOLT-M6", Some(rossi)).await;
    let nuts = app.seed_product("NUT-M6", Some(rossi)).await;
    let washers = app.seed_product("WASHER-M6", None).await;
    seed::stock_level(&app.state, bolts, location, dec!(3), dec!(10), dec!(40)).await;
    seed::stock_level(&app.state, nuts, location, dec!(0), dec!(5), dec!(0)).await;
    seed::stock_level(&app.state, washers, location, dec!(1), dec!(8), dec!(25)).await;
    // Healthy stock stays out of the report entirely.
    let screws = app.seed_product("SCREW-M4", Some(bianchi)).await;
    seed::stock_level(&app.state, screws, location, dec!(100), dec!(10), dec!(40)).await;

    let report = app.state.stock_monitor.run().await.unwrap();

    assert_eq!(report.below_threshold, 3);
    assert_eq!(report.requests_created.len(), 2);
    assert!(report.unprocessable.is_empty());

    let mut preferred_group = None;
    let mut open_group = None;
    for request_id in &report.requests_created {
        let lines = app
            .state
            .quotation_requests
            .lines(*request_id)
            .await
            .unwrap();
        let quotes = app.state.supplier_quotes.for_request(*request_id).await.unwrap();
        if lines.iter().any(|l| l.product_id == washers) {
            open_group = Some((lines, quotes));
        } else {
            preferred_group = Some((lines, quotes));
        }
    }

    let (lines, quotes) = preferred_group.expect("request for the preferred-supplier group");
    assert_eq!(lines.len(), 2);
    // A zero reorder quantity falls back to the threshold shortfall.
    let nut_line = lines.iter().find(|l| l.product_id == nuts).unwrap();
    assert_eq!(nut_line.suggested_quantity, dec!(5));
    let bolt_line = lines.iter().find(|l| l.product_id == bolts).unwrap();
    assert_eq!(bolt_line.suggested_quantity, dec!(40));
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].supplier_id, rossi);

    // No preferred supplier: every active supplier is invited.
    let (lines, quotes) = open_group.expect("request for products without a preferred supplier");
    assert_eq!(lines.len(), 1);
    assert_eq!(quotes.len(), 2);

    // Monitor-created requests are already Open.
    for request_id in &report.requests_created {
        let request = app
            .state
            .quotation_requests
            .get(*request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, QuotationRequestStatus::Open);
    }
}

/// A product already sitting on an Open or Sent request is not requested
/// again by the next scan.
#[tokio::test]
async fn running_requests_suppress_duplicates() {
    let app = TestApp::new().await;
    let location = Uuid::new_v4();
    let rossi = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", Some(rossi)).await;
    seed::stock_level(&app.state, bolts, location, dec!(3), dec!(10), dec!(40)).await;

    let first = app.state.stock_monitor.run().await.unwrap();
    assert_eq!(first.requests_created.len(), 1);

    // Stock has not recovered; the second scan sees the running request.
    let second = app.state.stock_monitor.run().await.unwrap();
    assert_eq!(second.below_threshold, 1);
    assert_eq!(second.skipped_already_requested, 1);
    assert!(second.requests_created.is_empty());
}
