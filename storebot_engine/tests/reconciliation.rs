use sbt_common::Rupiah;
use storebot_engine::{
    db_types::PaymentStatus,
    order_objects::CheckoutRequest,
    NotificationStatus,
    PaymentNotification,
    Reconciliation,
    StorefrontDatabase,
    StorefrontError,
    WebhookReconciler,
};

mod common;
use common::{seed_product, setup, TestReconciler, TestStore};

fn reconciler(store: &TestStore) -> TestReconciler {
    // The reconciler owns its own API handles onto the same database and gateway.
    let db = store.orders.db().clone();
    let orders = storebot_engine::OrderFlowApi::new(db.clone(), store.gateway.clone(), Default::default());
    let deposits = storebot_engine::DepositApi::new(db, store.gateway.clone(), Default::default());
    WebhookReconciler::new(orders, deposits)
}

#[tokio::test]
async fn referenced_notification_settles_an_order() {
    let store = setup().await;
    let product = seed_product(&store, "gdrive_2tb", 35_000, 5).await;
    let (order, _) = store.orders.checkout_with_qris(CheckoutRequest::new(8, product.id, 1)).await.unwrap();

    let rec = reconciler(&store);
    let notification =
        PaymentNotification::Reference { reference: order.order_id.clone(), status: NotificationStatus::Completed };
    let result = rec.handle(notification).await.expect("Reconciliation failed");
    let Reconciliation::OrderSettled { order, credentials } = result else {
        panic!("Expected a settled order");
    };
    assert_eq!(order.status, PaymentStatus::Paid);
    assert_eq!(credentials.len(), 1);
    common::tear_down(store).await;
}

#[tokio::test]
async fn topup_references_are_routed_to_the_deposit_side() {
    let store = setup().await;
    let (topup, _) = store.deposits.create_topup(31, None, Rupiah::from(75_000)).await.unwrap();

    let rec = reconciler(&store);
    let notification =
        PaymentNotification::Reference { reference: topup.topup_id.clone(), status: NotificationStatus::Completed };
    let result = rec.handle(notification).await.expect("Reconciliation failed");
    let Reconciliation::TopupSettled { topup, new_balance } = result else {
        panic!("Expected a settled top-up");
    };
    assert_eq!(topup.status, PaymentStatus::Paid);
    assert_eq!(new_balance, Rupiah::from(75_000));
    common::tear_down(store).await;
}

#[tokio::test]
async fn expired_notification_annuls_a_pending_order() {
    let store = setup().await;
    let product = seed_product(&store, "zoom_pro", 40_000, 2).await;
    let (order, _) = store.orders.checkout_with_qris(CheckoutRequest::new(9, product.id, 1)).await.unwrap();

    let rec = reconciler(&store);
    let notification =
        PaymentNotification::Reference { reference: order.order_id.clone(), status: NotificationStatus::Expired };
    let result = rec.handle(notification).await.unwrap();
    let Reconciliation::OrderAnnulled { order } = result else {
        panic!("Expected an annulled order");
    };
    assert_eq!(order.status, PaymentStatus::Expired);

    // A repeated expiry notification is a harmless no-op.
    let notification =
        PaymentNotification::Reference { reference: order.order_id.clone(), status: NotificationStatus::Expired };
    let result = rec.handle(notification).await.unwrap();
    assert!(matches!(result, Reconciliation::AlreadyProcessed { .. }));
    common::tear_down(store).await;
}

#[tokio::test]
async fn free_text_notification_matches_by_amount() {
    let store = setup().await;
    let product = seed_product(&store, "chatgpt_plus", 50_000, 5).await;
    let (order, charge) = store.orders.checkout_with_qris(CheckoutRequest::new(10, product.id, 1)).await.unwrap();
    assert_eq!(charge.amount_due, Rupiah::from(50_101));

    let rec = reconciler(&store);
    // The relayed message carries the charged amount with Indonesian thousand separators.
    let text = "Pembayaran Rp 50.101 dari BUDI SANTOSO berhasil".to_string();
    let result = rec.handle(PaymentNotification::Message { text }).await.expect("Reconciliation failed");
    let Reconciliation::OrderSettled { order: settled, .. } = result else {
        panic!("Expected a settled order");
    };
    assert_eq!(settled.order_id, order.order_id);
    common::tear_down(store).await;
}

#[tokio::test]
async fn free_text_matching_tolerates_the_uniquifier() {
    let store = setup().await;
    let (topup, charge) = store.deposits.create_topup(33, None, Rupiah::from(100_000)).await.unwrap();
    assert_eq!(charge.amount_due, Rupiah::from(100_101));

    let rec = reconciler(&store);
    // The bank reports a slightly different amount; it is still within the matching window.
    let text = "Pembayaran Rp100.350 dari SITI berhasil".to_string();
    let result = rec.handle(PaymentNotification::Message { text }).await.expect("Reconciliation failed");
    let Reconciliation::TopupSettled { topup: settled, .. } = result else {
        panic!("Expected a settled top-up");
    };
    assert_eq!(settled.topup_id, topup.topup_id);
    common::tear_down(store).await;
}

#[tokio::test]
async fn pending_charges_are_visible_as_soon_as_checkout_returns() {
    let store = setup().await;
    let product = seed_product(&store, "spotify_family", 27_500, 8).await;
    // The checkout commit must be durable before the call returns, so a lookup on a different pool
    // connection finds the pending row straight away. Repeat a few times to shake out any straggler.
    for user in 1..=5 {
        let (order, charge) = store.orders.checkout_with_qris(CheckoutRequest::new(user, product.id, 1)).await.unwrap();
        let found = store
            .orders
            .db()
            .find_pending_order_by_amount(charge.amount_due, 0)
            .await
            .unwrap()
            .expect("Pending order was not visible immediately after checkout");
        assert_eq!(found.order_id, order.order_id);
    }
    let (topup, charge) = store.deposits.create_topup(44, None, Rupiah::from(20_000)).await.unwrap();
    let found = store
        .deposits
        .db()
        .find_pending_topup_by_amount(charge.amount_due, 0)
        .await
        .unwrap()
        .expect("Pending top-up was not visible immediately after creation");
    assert_eq!(found.topup_id, topup.topup_id);
    common::tear_down(store).await;
}

#[tokio::test]
async fn unmatched_amounts_are_rejected() {
    let store = setup().await;
    let rec = reconciler(&store);
    let text = "Pembayaran Rp 999.999 dari SESEORANG berhasil".to_string();
    let err = rec.handle(PaymentNotification::Message { text }).await.expect_err("Should not match");
    assert!(matches!(err, StorefrontError::NoMatchingPayment(_)));
    common::tear_down(store).await;
}

#[tokio::test]
async fn garbled_notifications_are_rejected() {
    let store = setup().await;
    let rec = reconciler(&store);
    let text = "Saldo anda bulan ini: Rp 1.000.000".to_string();
    let err = rec.handle(PaymentNotification::Message { text }).await.expect_err("Should not parse");
    assert!(matches!(err, StorefrontError::InvalidNotification(_)));
    common::tear_down(store).await;
}

#[tokio::test]
async fn oldest_pending_order_wins_an_ambiguous_match() {
    let store = setup().await;
    let product = seed_product(&store, "notion_plus", 30_000, 5).await;
    let (first, c1) = store.orders.checkout_with_qris(CheckoutRequest::new(1, product.id, 1)).await.unwrap();
    let (_second, c2) = store.orders.checkout_with_qris(CheckoutRequest::new(2, product.id, 1)).await.unwrap();
    // Both charges are within the tolerance window of each other.
    assert!((c1.amount_due.value() - c2.amount_due.value()).abs() <= 999);
    common::backdate(&store, "orders", first.order_id.as_str(), 5).await;

    let rec = reconciler(&store);
    let text = format!("Pembayaran Rp {} dari AGUS berhasil", c2.amount_due.value());
    let result = rec.handle(PaymentNotification::Message { text }).await.unwrap();
    let Reconciliation::OrderSettled { order, .. } = result else {
        panic!("Expected a settled order");
    };
    assert_eq!(order.order_id, first.order_id);
    common::tear_down(store).await;
}
