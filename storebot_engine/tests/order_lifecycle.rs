use sbt_common::Rupiah;
use storebot_engine::{
    db_types::{NewVoucher, PaymentStatus},
    order_objects::CheckoutRequest,
    OrderSettlement,
    StorefrontDatabase,
    StorefrontError,
    VoucherError,
};

mod common;
use common::{seed_balance, seed_product, setup, tear_down};

#[tokio::test]
async fn balance_checkout_settles_immediately() {
    let store = setup().await;
    let product = seed_product(&store, "netflix_1m", 25_000, 10).await;
    seed_balance(&store, 42, 100_000).await;

    let req = CheckoutRequest::new(42, product.id, 2).with_username("budi");
    let fulfilled = store.orders.checkout_with_balance(req).await.expect("Checkout failed");

    assert_eq!(fulfilled.order.status, PaymentStatus::Paid);
    assert!(fulfilled.order.paid_at.is_some());
    assert_eq!(fulfilled.order.total_price, Rupiah::from(50_000));
    assert_eq!(fulfilled.credentials.len(), 2);
    assert_eq!(fulfilled.new_balance, Rupiah::from(50_000));
    // The pool shrank and the credentials are bound to the order.
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 8);
    let delivered = store.orders.credentials_for_order(fulfilled.order.id).await.unwrap();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(|c| c.is_sold && c.order_id == Some(fulfilled.order.id)));
    // The ledger carries the debit.
    let history = store.deposits.history(42, 10).await.unwrap();
    assert_eq!(history[0].amount, Rupiah::from(-50_000));
    tear_down(store).await;
}

#[tokio::test]
async fn balance_checkout_fails_without_funds() {
    let store = setup().await;
    let product = seed_product(&store, "spotify_1m", 30_000, 5).await;
    seed_balance(&store, 7, 10_000).await;

    let req = CheckoutRequest::new(7, product.id, 1);
    let err = store.orders.checkout_with_balance(req).await.expect_err("Checkout should have failed");
    assert!(matches!(err, StorefrontError::InsufficientFunds { .. }));

    // The failed attempt is recorded as a cancelled order; the balance and pool are untouched.
    assert_eq!(store.deposits.balance(7).await.unwrap(), Rupiah::from(10_000));
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 5);
    let orders = store.orders.search_orders(Default::default()).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, PaymentStatus::Cancelled);
    tear_down(store).await;
}

#[tokio::test]
async fn qris_checkout_is_pending_until_confirmed() {
    let store = setup().await;
    let product = seed_product(&store, "vpn_1m", 15_000, 3).await;

    let req = CheckoutRequest::new(9, product.id, 1).with_username("siti");
    let (order, charge) = store.orders.checkout_with_qris(req).await.expect("Checkout failed");

    assert_eq!(order.status, PaymentStatus::Pending);
    assert_eq!(order.total_price, Rupiah::from(15_000));
    // The stored amount_due is the provider's charged amount, uniquifier included.
    assert_eq!(order.amount_due, charge.amount_due);
    assert_eq!(charge.amount_due, Rupiah::from(15_101));
    // Nothing is allocated while the charge is pending.
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 3);

    let settlement = store.orders.confirm_payment(&order.order_id).await.expect("Confirmation failed");
    let OrderSettlement::Settled { order, credentials } = settlement else {
        panic!("Expected a settlement");
    };
    assert_eq!(order.status, PaymentStatus::Paid);
    assert_eq!(credentials.len(), 1);
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 2);
    tear_down(store).await;
}

#[tokio::test]
async fn duplicate_confirmation_is_a_noop() {
    let store = setup().await;
    let product = seed_product(&store, "disney_1m", 20_000, 5).await;
    let (order, _) = store.orders.checkout_with_qris(CheckoutRequest::new(3, product.id, 1)).await.unwrap();

    let first = store.orders.confirm_payment(&order.order_id).await.unwrap();
    assert!(first.is_settled());
    let second = store.orders.confirm_payment(&order.order_id).await.unwrap();
    assert!(matches!(second, OrderSettlement::AlreadyProcessed { .. }));
    // Only one credential ever left the pool.
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 4);
    tear_down(store).await;
}

#[tokio::test]
async fn cancelled_and_expired_orders_reject_late_confirmation() {
    let store = setup().await;
    let product = seed_product(&store, "yt_premium", 12_000, 4).await;

    let (cancelled, _) = store.orders.checkout_with_qris(CheckoutRequest::new(1, product.id, 1)).await.unwrap();
    store.orders.cancel_order(&cancelled.order_id).await.unwrap();
    let settlement = store.orders.confirm_payment(&cancelled.order_id).await.unwrap();
    assert!(matches!(settlement, OrderSettlement::AlreadyProcessed { .. }));

    let (expired, _) = store.orders.checkout_with_qris(CheckoutRequest::new(2, product.id, 1)).await.unwrap();
    store.orders.expire_order(&expired.order_id).await.unwrap();
    let settlement = store.orders.confirm_payment(&expired.order_id).await.unwrap();
    assert!(matches!(settlement, OrderSettlement::AlreadyProcessed { .. }));

    // Terminal states are monotone: cancelling an expired order is an error, not a transition.
    let err = store.orders.cancel_order(&expired.order_id).await.expect_err("Cancel should fail");
    assert!(matches!(err, StorefrontError::OrderNotPending { .. }));
    assert_eq!(store.orders.available_stock(product.id).await.unwrap(), 4);
    tear_down(store).await;
}

#[tokio::test]
async fn paid_charge_with_empty_pool_stays_pending() {
    let store = setup().await;
    let product = seed_product(&store, "canva_1m", 18_000, 1).await;
    let (first, _) = store.orders.checkout_with_qris(CheckoutRequest::new(5, product.id, 1)).await.unwrap();
    let (second, _) = store.orders.checkout_with_qris(CheckoutRequest::new(6, product.id, 1)).await.unwrap();

    assert!(store.orders.confirm_payment(&first.order_id).await.unwrap().is_settled());
    // The second buyer paid, but the pool is empty. The order must not flip to paid.
    let settlement = store.orders.confirm_payment(&second.order_id).await.unwrap();
    let OrderSettlement::InsufficientStock { order, requested, available } = settlement else {
        panic!("Expected a stock shortfall");
    };
    assert_eq!(order.status, PaymentStatus::Pending);
    assert_eq!(requested, 1);
    assert_eq!(available, 0);
    let order = store.orders.fetch_order(&second.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Pending);
    tear_down(store).await;
}

#[tokio::test]
async fn quote_clamps_quantity_and_applies_voucher() {
    let store = setup().await;
    let product = seed_product(&store, "office_1y", 10_999, 3).await;
    store.orders.db().insert_voucher(NewVoucher::percentage("DISKON15", 15)).await.unwrap();

    // Requesting more than the pool holds clamps down to the pool size.
    let quote = store.orders.quote(product.id, 10, Some("diskon15")).await.expect("Quote failed");
    assert_eq!(quote.quantity, 3);
    assert_eq!(quote.subtotal, Rupiah::from(32_997));
    // 15% of 32.997 is 4.949,55, rounded down to whole rupiah.
    assert_eq!(quote.discount, Rupiah::from(4_949));
    assert_eq!(quote.total, Rupiah::from(28_048));
    tear_down(store).await;
}

#[tokio::test]
async fn voucher_cap_and_minimum_are_enforced() {
    let store = setup().await;
    let product = seed_product(&store, "steam_wallet", 50_000, 10).await;
    seed_balance(&store, 11, 500_000).await;
    seed_balance(&store, 12, 500_000).await;
    let voucher = NewVoucher::fixed("HEMAT5K", Rupiah::from(5_000))
        .with_max_uses(1)
        .with_min_purchase(Rupiah::from(40_000));
    store.orders.db().insert_voucher(voucher).await.unwrap();

    let req = CheckoutRequest::new(11, product.id, 1).with_voucher("HEMAT5K");
    let fulfilled = store.orders.checkout_with_balance(req).await.expect("Checkout failed");
    assert_eq!(fulfilled.order.total_price, Rupiah::from(45_000));
    assert_eq!(fulfilled.order.discount, Rupiah::from(5_000));
    assert_eq!(fulfilled.order.voucher_code.as_deref(), Some("HEMAT5K"));

    // Second use is over the cap.
    let req = CheckoutRequest::new(12, product.id, 1).with_voucher("HEMAT5K");
    let err = store.orders.checkout_with_balance(req).await.expect_err("Voucher cap should have been enforced");
    assert!(matches!(err, StorefrontError::Voucher(VoucherError::CapReached(_))));
    tear_down(store).await;
}

#[tokio::test]
async fn quote_rejects_vouchers_below_minimum() {
    let store = setup().await;
    let product = seed_product(&store, "cheap_item", 10_000, 5).await;
    let voucher = NewVoucher::fixed("BIGSPEND", Rupiah::from(10_000)).with_min_purchase(Rupiah::from(100_000));
    store.orders.db().insert_voucher(voucher).await.unwrap();

    let err = store.orders.quote(product.id, 1, Some("BIGSPEND")).await.expect_err("Quote should fail");
    assert!(matches!(err, StorefrontError::Voucher(VoucherError::MinPurchaseNotMet { .. })));
    tear_down(store).await;
}

#[tokio::test]
async fn inactive_products_cannot_be_bought() {
    let store = setup().await;
    let product = seed_product(&store, "legacy_product", 5_000, 5).await;
    store.orders.retire_product(product.id).await.unwrap();

    let err = store.orders.quote(product.id, 1, None).await.expect_err("Quote should fail");
    assert!(matches!(err, StorefrontError::ProductNotPurchasable(_)));
    // The row survives so that old order snapshots keep their links.
    assert!(store.orders.fetch_product(product.id).await.unwrap().is_some());
    tear_down(store).await;
}
