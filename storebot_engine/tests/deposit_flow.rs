use sbt_common::Rupiah;
use storebot_engine::{
    db_types::{EntryType, PaymentStatus},
    order_objects::CheckoutRequest,
    StorefrontDatabase,
    StorefrontError,
    TopupSettlement,
};

mod common;
use common::{seed_product, setup, tear_down};

#[tokio::test]
async fn topup_credits_balance_on_settlement() {
    let store = setup().await;
    let (topup, charge) = store.deposits.create_topup(21, Some("wati"), Rupiah::from(50_000)).await.unwrap();

    assert!(topup.topup_id.is_topup());
    assert_eq!(topup.status, PaymentStatus::Pending);
    assert_eq!(topup.amount, Rupiah::from(50_000));
    // The charged amount carries the uniquifier; the credited amount does not.
    assert_eq!(topup.amount_due, charge.amount_due);
    assert_eq!(charge.amount_due, Rupiah::from(50_101));
    assert_eq!(store.deposits.balance(21).await.unwrap(), Rupiah::from(0));

    let settlement = store.deposits.complete_topup(&topup.topup_id).await.unwrap();
    let TopupSettlement::Settled { topup, new_balance } = settlement else {
        panic!("Expected a settlement");
    };
    assert_eq!(topup.status, PaymentStatus::Paid);
    assert_eq!(new_balance, Rupiah::from(50_000));
    assert_eq!(store.deposits.balance(21).await.unwrap(), Rupiah::from(50_000));

    let history = store.deposits.history(21, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry_type, EntryType::Topup);
    assert_eq!(history[0].amount, Rupiah::from(50_000));
    assert_eq!(history[0].topup_id, Some(topup.id));
    tear_down(store).await;
}

#[tokio::test]
async fn duplicate_topup_confirmation_credits_nothing() {
    let store = setup().await;
    let (topup, _) = store.deposits.create_topup(22, None, Rupiah::from(25_000)).await.unwrap();

    let first = store.deposits.complete_topup(&topup.topup_id).await.unwrap();
    assert!(matches!(first, TopupSettlement::Settled { .. }));
    let second = store.deposits.complete_topup(&topup.topup_id).await.unwrap();
    assert!(matches!(second, TopupSettlement::AlreadyProcessed { .. }));
    // The balance was credited exactly once.
    assert_eq!(store.deposits.balance(22).await.unwrap(), Rupiah::from(25_000));
    assert_eq!(store.deposits.history(22, 10).await.unwrap().len(), 1);
    tear_down(store).await;
}

#[tokio::test]
async fn cancelled_topup_cannot_settle() {
    let store = setup().await;
    let (topup, _) = store.deposits.create_topup(23, None, Rupiah::from(10_000)).await.unwrap();

    let cancelled = store.deposits.cancel_topup(&topup.topup_id).await.unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
    let settlement = store.deposits.complete_topup(&topup.topup_id).await.unwrap();
    assert!(matches!(settlement, TopupSettlement::AlreadyProcessed { .. }));
    assert_eq!(store.deposits.balance(23).await.unwrap(), Rupiah::from(0));

    // And it cannot be cancelled twice.
    let err = store.deposits.cancel_topup(&topup.topup_id).await.expect_err("Second cancel should fail");
    assert!(matches!(err, StorefrontError::TopupNotPending { .. }));
    tear_down(store).await;
}

#[tokio::test]
async fn cached_balance_equals_the_summed_ledger() {
    let store = setup().await;
    let product = seed_product(&store, "office_365", 15_000, 10).await;
    let user = 61;

    // A mixed sequence of credits and debits: two settled top-ups, two balance purchases and a
    // compensating refund.
    let (topup, _) = store.deposits.create_topup(user, Some("joko"), Rupiah::from(50_000)).await.unwrap();
    store.deposits.complete_topup(&topup.topup_id).await.unwrap();
    let first = store.orders.checkout_with_balance(CheckoutRequest::new(user, product.id, 2)).await.unwrap();
    assert_eq!(first.new_balance, Rupiah::from(20_000));
    let (topup, _) = store.deposits.create_topup(user, None, Rupiah::from(20_000)).await.unwrap();
    store.deposits.complete_topup(&topup.topup_id).await.unwrap();
    let second = store.orders.checkout_with_balance(CheckoutRequest::new(user, product.id, 1)).await.unwrap();
    store
        .orders
        .db()
        .credit_balance(
            user,
            None,
            Rupiah::from(15_000),
            EntryType::Refund,
            "compensating credit",
            Some(second.order.id),
            None,
        )
        .await
        .unwrap();

    // The cached balance always equals the sum of the user's ledger entries.
    let balance = store.deposits.balance(user).await.unwrap();
    assert_eq!(balance, Rupiah::from(50_000 - 30_000 + 20_000 - 15_000 + 15_000));
    let history = store.deposits.history(user, 50).await.unwrap();
    assert_eq!(history.len(), 5);
    let ledger_total: Rupiah = history.iter().map(|e| e.amount).sum();
    assert_eq!(ledger_total, balance);
    tear_down(store).await;
}

#[tokio::test]
async fn rejected_charge_leaves_no_topup_row() {
    let store = setup().await;
    store.gateway.fail_next_charge();
    let err = store.deposits.create_topup(24, None, Rupiah::from(10_000)).await.expect_err("Charge should fail");
    assert!(matches!(err, StorefrontError::Gateway(_)));
    // The charge was never accepted, so no pending row exists to leak.
    assert!(store
        .deposits
        .db()
        .find_pending_topup_by_amount(Rupiah::from(10_000), 999)
        .await
        .unwrap()
        .is_none());
    tear_down(store).await;
}
