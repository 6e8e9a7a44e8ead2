mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{MockGateway, TestApp, WEBHOOK_SECRET};
use futures::future::join_all;
use progression::Error;
use progression::entity::credit_purchases::{STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING};
use progression::repository;
use progression::services::purchases::REASON_PURCHASE;
use progression::services::webhook::{self, EVENT_ASYNC_PAYMENT_FAILED, EVENT_CHECKOUT_COMPLETED};
use progression::services::{CreditService, PurchaseService, WebhookOutcome};
use serde_json::json;

const RECEIPT: &str = "https://pay.example.com/receipts/rcpt_1";

async fn setup() -> (TestApp, PurchaseService, Arc<MockGateway>) {
    let app = TestApp::with_payments().await;
    app.user("buyer", 2, 0, false).await;
    let gateway = Arc::new(MockGateway::with_receipt(RECEIPT));
    let service = PurchaseService::with_gateway(app.ctx.clone(), gateway.clone());
    (app, service, gateway)
}

fn event(event_type: &str, session_id: &str, amount_total: i64, credits: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": event_type,
        "data": {
            "object": {
                "id": session_id,
                "amount_total": amount_total,
                "payment_intent": "pi_1",
                "customer": "cus_test",
                "metadata": {"credits": credits, "user_id": "buyer"}
            }
        }
    }))
    .unwrap()
}

fn signed(app: &TestApp, payload: &[u8]) -> String {
    webhook::sign(payload, WEBHOOK_SECRET, app.now().timestamp()).unwrap()
}

#[tokio::test]
async fn test_checkout_records_pending_purchase() {
    let (app, service, gateway) = setup().await;

    let session = service.create_checkout("buyer", 10).await.unwrap();
    assert_eq!(session.id, "cs_test_1");

    let purchase = repository::purchases::get_by_session(app.ctx.conn(), &session.id).await.unwrap();
    assert_eq!(purchase.status, STATUS_PENDING);
    assert_eq!(purchase.credits, 10);
    assert_eq!(purchase.amount_paid, 350);
    assert_eq!(purchase.external_customer_id.as_deref(), Some("cus_test"));

    let requests = gateway.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].purchase_id, purchase.id);
    assert_eq!(requests[0].email, "buyer@example.com");
    assert_eq!(requests[0].currency, "nzd");
    assert!(requests[0].success_url.starts_with("https://play.example.com/"));
}

#[tokio::test]
async fn test_checkout_amount_limits() {
    let (_app, service, gateway) = setup().await;
    for credits in [0, 2, 1001] {
        let err = service.create_checkout("buyer", credits).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCreditAmount(_)), "{credits} gave {err}");
    }
    assert!(gateway.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_webhook_credits_once() {
    let (app, service, _gateway) = setup().await;
    let session = service.create_checkout("buyer", 10).await.unwrap();
    let payload = event(EVENT_CHECKOUT_COMPLETED, &session.id, 350, "10");
    let header = signed(&app, &payload);

    let results = join_all((0..4).map(|_| {
        let service = service.clone();
        let payload = payload.clone();
        let header = header.clone();
        tokio::spawn(async move { service.handle_webhook(&payload, &header).await })
    }))
    .await;

    let mut credited = 0;
    for result in results {
        match result.expect("task panicked") {
            Ok(WebhookOutcome::Credited { credits, user_id, .. }) => {
                assert_eq!(credits, 10);
                assert_eq!(user_id, "buyer");
                credited += 1;
            }
            Err(Error::PurchaseAlreadyProcessed) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(credited, 1);

    let credits = CreditService::new(app.ctx.clone());
    assert_eq!(credits.get_credit_balance("buyer").await.unwrap(), (2, 10));

    let purchase = repository::purchases::get_by_session(app.ctx.conn(), &session.id).await.unwrap();
    assert_eq!(purchase.status, STATUS_COMPLETED);
    assert_eq!(purchase.external_payment_id.as_deref(), Some("pi_1"));
    assert_eq!(purchase.receipt_url.as_deref(), Some(RECEIPT));

    let ledger = repository::credit_adjustments::find_by_user(app.ctx.conn(), "buyer", None, 0)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].reason, REASON_PURCHASE);
    assert_eq!(ledger[0].purchase_id.as_deref(), Some(purchase.id.as_str()));

    // A late redelivery is still refused.
    let err = service.handle_webhook(&payload, &header).await.unwrap_err();
    assert!(matches!(err, Error::PurchaseAlreadyProcessed));
}

#[tokio::test]
async fn test_mismatched_amount_is_refused() {
    let (app, service, _gateway) = setup().await;
    let session = service.create_checkout("buyer", 10).await.unwrap();

    let payload = event(EVENT_CHECKOUT_COMPLETED, &session.id, 35, "10");
    let err = service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap_err();
    assert!(matches!(err, Error::PurchaseMismatch(_)));

    let payload = event(EVENT_CHECKOUT_COMPLETED, &session.id, 350, "100");
    let err = service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap_err();
    assert!(matches!(err, Error::PurchaseMismatch(_)));

    let purchase = repository::purchases::get_by_session(app.ctx.conn(), &session.id).await.unwrap();
    assert_eq!(purchase.status, STATUS_PENDING);
    let credits = CreditService::new(app.ctx.clone());
    assert_eq!(credits.get_credit_balance("buyer").await.unwrap(), (2, 0));
}

#[tokio::test]
async fn test_bad_signatures_are_refused() {
    let (app, service, _gateway) = setup().await;
    let session = service.create_checkout("buyer", 10).await.unwrap();
    let payload = event(EVENT_CHECKOUT_COMPLETED, &session.id, 350, "10");

    let forged = webhook::sign(&payload, "whsec_other", app.now().timestamp()).unwrap();
    let err = service.handle_webhook(&payload, &forged).await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature));

    let err = service.handle_webhook(&payload, "").await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature));

    let stale = signed(&app, &payload);
    app.clock.advance(Duration::minutes(6));
    let err = service.handle_webhook(&payload, &stale).await.unwrap_err();
    assert!(matches!(err, Error::SignatureExpired));

    let purchase = repository::purchases::get_by_session(app.ctx.conn(), &session.id).await.unwrap();
    assert_eq!(purchase.status, STATUS_PENDING);
}

#[tokio::test]
async fn test_failed_payment_and_unknown_events() {
    let (app, service, _gateway) = setup().await;
    let session = service.create_checkout("buyer", 10).await.unwrap();

    let payload = event(EVENT_ASYNC_PAYMENT_FAILED, &session.id, 350, "10");
    let outcome = service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::MarkedFailed { .. }));
    let purchase = repository::purchases::get_by_session(app.ctx.conn(), &session.id).await.unwrap();
    assert_eq!(purchase.status, STATUS_FAILED);

    let outcome = service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

    let payload = event("invoice.paid", &session.id, 350, "10");
    let outcome = service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored {
        event_type: "invoice.paid".to_string()
    });
}

#[tokio::test]
async fn test_payments_disabled_without_keys() {
    let app = TestApp::new().await;
    app.user("buyer", 0, 0, false).await;
    let service = PurchaseService::new(app.ctx.clone()).unwrap();

    let err = service.create_checkout("buyer", 10).await.unwrap_err();
    assert!(matches!(err, Error::PaymentsNotConfigured));
    let err = service.handle_webhook(b"{}", "t=1,v1=00").await.unwrap_err();
    assert!(matches!(err, Error::PaymentsNotConfigured));
}

#[tokio::test]
async fn test_cleanup_removes_only_stale_unfinished_purchases() {
    let (app, service, _gateway) = setup().await;
    let pending = service.create_checkout("buyer", 5).await.unwrap();
    let failed = service.create_checkout("buyer", 6).await.unwrap();
    let completed = service.create_checkout("buyer", 7).await.unwrap();

    let payload = event(EVENT_ASYNC_PAYMENT_FAILED, &failed.id, 210, "6");
    service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap();
    let payload = event(EVENT_CHECKOUT_COMPLETED, &completed.id, 245, "7");
    service.handle_webhook(&payload, &signed(&app, &payload)).await.unwrap();

    app.clock.advance(Duration::days(6));
    let fresh = service.create_checkout("buyer", 8).await.unwrap();
    assert_eq!(service.cleanup_stale_purchases().await.unwrap(), 0);

    app.clock.advance(Duration::days(2));
    assert_eq!(service.cleanup_stale_purchases().await.unwrap(), 2);

    let conn = app.ctx.conn();
    assert!(repository::purchases::find_by_session(conn, &pending.id).await.unwrap().is_none());
    assert!(repository::purchases::find_by_session(conn, &failed.id).await.unwrap().is_none());
    assert!(repository::purchases::find_by_session(conn, &completed.id).await.unwrap().is_some());
    assert!(repository::purchases::find_by_session(conn, &fresh.id).await.unwrap().is_some());
}
