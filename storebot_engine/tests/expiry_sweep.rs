use chrono::Duration;
use sbt_common::Rupiah;
use storebot_engine::{db_types::PaymentStatus, order_objects::CheckoutRequest, OrderSettlement};

mod common;
use common::{backdate, seed_product, setup, tear_down};

#[tokio::test]
async fn sweep_only_expires_old_pending_orders() {
    let store = setup().await;
    let product = seed_product(&store, "cursor_pro", 60_000, 10).await;
    let (stale, _) = store.orders.checkout_with_qris(CheckoutRequest::new(1, product.id, 1)).await.unwrap();
    let (fresh, _) = store.orders.checkout_with_qris(CheckoutRequest::new(2, product.id, 1)).await.unwrap();
    let (paid, _) = store.orders.checkout_with_qris(CheckoutRequest::new(3, product.id, 1)).await.unwrap();
    store.orders.confirm_payment(&paid.order_id).await.unwrap();
    backdate(&store, "orders", stale.order_id.as_str(), 20).await;
    backdate(&store, "orders", paid.order_id.as_str(), 20).await;

    let expired = store.orders.expire_old_orders(Duration::minutes(15)).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].order_id, stale.order_id);
    assert_eq!(expired[0].status, PaymentStatus::Expired);

    // The fresh order is still live and the paid one was never touched.
    let fresh = store.orders.fetch_order(&fresh.order_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, PaymentStatus::Pending);
    let paid = store.orders.fetch_order(&paid.order_id).await.unwrap().unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    tear_down(store).await;
}

#[tokio::test]
async fn sweep_expires_old_pending_topups() {
    let store = setup().await;
    let (stale, _) = store.deposits.create_topup(41, None, Rupiah::from(20_000)).await.unwrap();
    let (fresh, _) = store.deposits.create_topup(42, None, Rupiah::from(30_000)).await.unwrap();
    backdate(&store, "topup_requests", stale.topup_id.as_str(), 16).await;

    let expired = store.deposits.expire_old_topups(Duration::minutes(15)).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].topup_id, stale.topup_id);

    let fresh = store.deposits.fetch_topup(&fresh.topup_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, PaymentStatus::Pending);
    // No balance was ever credited for the expired request.
    assert_eq!(store.deposits.balance(41).await.unwrap(), Rupiah::from(0));
    tear_down(store).await;
}

#[tokio::test]
async fn swept_orders_reject_late_payment() {
    let store = setup().await;
    let product = seed_product(&store, "slack_pro", 45_000, 5).await;
    let (order, _) = store.orders.checkout_with_qris(CheckoutRequest::new(4, product.id, 1)).await.unwrap();
    backdate(&store, "orders", order.order_id.as_str(), 30).await;

    let expired = store.orders.expire_old_orders(Duration::minutes(15)).await.unwrap();
    assert_eq!(expired.len(), 1);

    // The buyer pays anyway, minutes too late. The money is reconciled manually; the order stays expired
    // and no credentials move.
    let settlement = store.orders.confirm_payment(&order.order_id).await.unwrap();
    assert!(matches!(settlement, OrderSettlement::AlreadyProcessed { .. }));
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 5);
    tear_down(store).await;
}

#[tokio::test]
async fn repeated_sweeps_are_idempotent() {
    let store = setup().await;
    let product = seed_product(&store, "figma_pro", 55_000, 5).await;
    let (order, _) = store.orders.checkout_with_qris(CheckoutRequest::new(5, product.id, 1)).await.unwrap();
    backdate(&store, "orders", order.order_id.as_str(), 20).await;

    assert_eq!(store.orders.expire_old_orders(Duration::minutes(15)).await.unwrap().len(), 1);
    assert_eq!(store.orders.expire_old_orders(Duration::minutes(15)).await.unwrap().len(), 0);
    tear_down(store).await;
}
