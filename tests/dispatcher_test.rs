mod common;

use chrono::{NaiveTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use bottega_api::{
    config::{DispatcherConfig, SendWindow},
    entities::{
        outbound_notification::{Channel, NotificationStatus, NotificationTargetKind},
        supplier_quote::SupplierQuoteStatus,
    },
    messaging::InMemoryGateway,
    services::notification_dispatcher::{NewNotification, NotificationDispatcher},
};
use common::TestApp;

fn windowed_config() -> DispatcherConfig {
    let mut config = DispatcherConfig::default();
    config.send_windows.insert(
        "email".to_string(),
        SendWindow::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        ),
    );
    config
}

fn dispatcher_with(
    app: &TestApp,
    gateway: Arc<InMemoryGateway>,
    config: DispatcherConfig,
) -> NotificationDispatcher {
    NotificationDispatcher::new(
        app.state.db.clone(),
        gateway,
        config,
        None,
        app.state.supplier_quotes.clone(),
        app.state.purchase_orders.clone(),
    )
}

async fn pending_quote(app: &TestApp) -> Uuid {
    let supplier = app.seed_supplier("Rossi Forniture", Some("rossi@example.test")).await;
    let bolts = app.seed_product("BOLT-M6", None).await;
    let request_id = app.sent_request(&[(bolts, dec!(10))], &[supplier]).await;
    let quotes = app.state.supplier_quotes.for_request(request_id).await.unwrap();
    quotes[0].id
}

/// A run at 22:00 against a 09:00-20:00 window reschedules to the next
/// 09:00 without consuming an attempt; a run the next morning delivers.
#[tokio::test]
async fn out_of_window_delivery_is_deferred_without_an_attempt() {
    let app = TestApp::new().await;
    let quote_id = pending_quote(&app).await;
    let gateway = Arc::new(InMemoryGateway::new());
    let dispatcher = dispatcher_with(&app, gateway.clone(), windowed_config());

    let at_night = Utc.with_ymd_and_hms(2099, 3, 10, 22, 0, 0).unwrap();
    let summary = dispatcher.run_due(at_night).await.unwrap();
    assert_eq!(summary.deferred, 1);
    assert_eq!(summary.delivered, 0);
    assert_eq!(gateway.sent_count(), 0);

    let pending = dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote_id)
        .await
        .unwrap();
    let notification = &pending[0];
    assert_eq!(notification.status, NotificationStatus::Pending);
    assert_eq!(notification.attempts, 0, "deferral consumes no attempt");
    assert_eq!(
        notification.next_eligible_at,
        Utc.with_ymd_and_hms(2099, 3, 11, 9, 0, 0).unwrap()
    );

    let next_morning = Utc.with_ymd_and_hms(2099, 3, 11, 9, 30, 0).unwrap();
    let summary = dispatcher.run_due(next_morning).await.unwrap();
    assert_eq!(summary.delivered, 1);
    assert_eq!(gateway.sent_count(), 1);

    let quote = app.state.supplier_quotes.get(quote_id).await.unwrap().unwrap();
    assert_eq!(quote.status, SupplierQuoteStatus::Sent);
}

/// Failed attempts climb the fixed backoff tiers: 60s, 300s, 900s.
#[tokio::test]
async fn failures_back_off_through_the_tiers() {
    let app = TestApp::new().await;
    let quote_id = Uuid::new_v4();
    let gateway = Arc::new(InMemoryGateway::new());
    let mut config = DispatcherConfig::default();
    config.max_attempts = 5;
    let dispatcher = dispatcher_with(&app, gateway.clone(), config);
    dispatcher
        .schedule(NewNotification {
            target_kind: NotificationTargetKind::SupplierQuote,
            target_id: quote_id,
            channel: Channel::Email,
            address: "rossi@example.test".to_string(),
            subject: "Quotation request".to_string(),
            body_template: "retry me".to_string(),
            variables: serde_json::json!({}),
        })
        .await
        .unwrap();
    gateway.fail_next(3);

    let t0 = Utc.with_ymd_and_hms(2099, 3, 10, 12, 0, 0).unwrap();
    let summary = dispatcher.run_due(t0).await.unwrap();
    assert_eq!(summary.retried, 1);
    let n = &dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote_id)
        .await
        .unwrap()[0];
    assert_eq!(n.attempts, 1);
    assert_eq!(n.next_eligible_at, t0 + chrono::Duration::seconds(60));
    assert!(n.last_error.is_some());

    // Not yet eligible: nothing happens.
    let early = dispatcher.run_due(t0 + chrono::Duration::seconds(30)).await.unwrap();
    assert_eq!(early.retried + early.delivered + early.failed, 0);

    let t1 = t0 + chrono::Duration::seconds(61);
    dispatcher.run_due(t1).await.unwrap();
    let n = &dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote_id)
        .await
        .unwrap()[0];
    assert_eq!(n.attempts, 2);
    assert_eq!(n.next_eligible_at, t1 + chrono::Duration::seconds(300));

    let t2 = t1 + chrono::Duration::seconds(301);
    dispatcher.run_due(t2).await.unwrap();
    let n = &dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote_id)
        .await
        .unwrap()[0];
    assert_eq!(n.attempts, 3);
    assert_eq!(n.next_eligible_at, t2 + chrono::Duration::seconds(900));

    // Fourth attempt succeeds.
    let t3 = t2 + chrono::Duration::seconds(901);
    let summary = dispatcher.run_due(t3).await.unwrap();
    assert_eq!(summary.delivered, 1);
}

/// After max_attempts the notification goes terminal and the quote is
/// marked SendFailed through the workflow callback.
#[tokio::test]
async fn exhausted_attempts_mark_quote_send_failed() {
    let app = TestApp::new().await;
    let quote_id = pending_quote(&app).await;
    let gateway = Arc::new(InMemoryGateway::new());
    let dispatcher = dispatcher_with(&app, gateway.clone(), DispatcherConfig::default());
    gateway.fail_next(3);

    let mut now = Utc.with_ymd_and_hms(2099, 3, 10, 12, 0, 0).unwrap();
    for _ in 0..3 {
        dispatcher.run_due(now).await.unwrap();
        now += chrono::Duration::seconds(1000);
    }

    let n = &dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote_id)
        .await
        .unwrap()[0];
    assert_eq!(n.status, NotificationStatus::Failed);
    assert_eq!(n.attempts, 3);

    let quote = app.state.supplier_quotes.get(quote_id).await.unwrap().unwrap();
    assert_eq!(quote.status, SupplierQuoteStatus::SendFailed);
    assert_eq!(gateway.sent_count(), 0);
}

/// Delivery confirmations are idempotent: a second success for the same
/// quote leaves it Sent and produces no new outbox records.
#[tokio::test]
async fn duplicate_delivery_confirmation_is_a_no_op() {
    let app = TestApp::new().await;
    let quote_id = pending_quote(&app).await;
    app.deliver_all().await;

    let quote = app.state.supplier_quotes.get(quote_id).await.unwrap().unwrap();
    assert_eq!(quote.status, SupplierQuoteStatus::Sent);

    let again = app.state.supplier_quotes.mark_sent(quote_id).await.unwrap();
    assert_eq!(again.status, SupplierQuoteStatus::Sent);

    let notifications = app
        .state
        .dispatcher
        .for_target(NotificationTargetKind::SupplierQuote, quote_id)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications.iter().all(|n| n.channel == Channel::Email));
}

/// schedule() writes a dispatchable record outside any workflow.
#[tokio::test]
async fn standalone_schedule_round_trip() {
    let app = TestApp::new().await;
    let quote_id = pending_quote(&app).await;
    let gateway = Arc::new(InMemoryGateway::new());
    let dispatcher = dispatcher_with(&app, gateway.clone(), DispatcherConfig::default());

    dispatcher
        .schedule(NewNotification {
            target_kind: NotificationTargetKind::SupplierQuote,
            target_id: quote_id,
            channel: Channel::Email,
            address: "rossi@example.test".to_string(),
            subject: "Reminder".to_string(),
            body_template: "Hello {{supplier}}".to_string(),
            variables: serde_json::json!({ "supplier": "Rossi" }),
        })
        .await
        .unwrap();

    dispatcher.run_due(Utc::now()).await.unwrap();
    let messages = gateway.sent_messages();
    // The original invitation plus the reminder are both due.
    assert!(messages.iter().any(|m| m.body == "Hello Rossi"));
}
