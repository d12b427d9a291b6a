#![allow(dead_code)]
use sbt_common::Rupiah;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use storebot_engine::{
    db_types::{NewCredential, NewProduct, Product},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, MockGateway},
    DepositApi,
    OrderFlowApi,
    SqliteDatabase,
    StorefrontDatabase,
    WebhookReconciler,
};

pub type TestOrderApi = OrderFlowApi<SqliteDatabase, MockGateway>;
pub type TestDepositApi = DepositApi<SqliteDatabase, MockGateway>;
pub type TestReconciler = WebhookReconciler<SqliteDatabase, MockGateway>;

pub struct TestStore {
    pub orders: TestOrderApi,
    pub deposits: TestDepositApi,
    pub gateway: MockGateway,
}

pub async fn setup() -> TestStore {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let gateway = MockGateway::new().with_uniquifier(101);
    let orders = OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let deposits = DepositApi::new(db, gateway.clone(), EventProducers::default());
    TestStore { orders, deposits, gateway }
}

pub async fn tear_down(store: TestStore) {
    let url = store.orders.db().url().to_string();
    drop(store);
    Sqlite::drop_database(&url).await.ok();
}

/// Creates an active product with the given number of unsold credentials in its pool.
pub async fn seed_product(store: &TestStore, name: &str, price: i64, stock: i64) -> Product {
    let product =
        store.orders.add_product(NewProduct::new(name, Rupiah::from(price))).await.expect("Error creating product");
    let creds = (0..stock)
        .map(|i| NewCredential::new(product.id, format!("{name}_user{i}@mail.test"), format!("pass{i}")))
        .collect::<Vec<_>>();
    let n = store.orders.import_credentials(creds).await.expect("Error importing credentials");
    assert_eq!(n, stock as u64);
    product
}

/// Gives the user spending money by crediting their balance directly.
pub async fn seed_balance(store: &TestStore, user_id: i64, amount: i64) {
    store
        .orders
        .db()
        .credit_balance(
            user_id,
            None,
            Rupiah::from(amount),
            storebot_engine::db_types::EntryType::Topup,
            "test seed",
            None,
            None,
        )
        .await
        .expect("Error seeding balance");
}

/// Rewinds a row's creation time so that expiry sweeps see it as old.
pub async fn backdate(store: &TestStore, table: &str, reference: &str, minutes: i64) {
    let key = if table == "orders" { "order_id" } else { "topup_id" };
    let sql = format!("UPDATE {table} SET created_at = datetime('now', '-{minutes} minutes') WHERE {key} = $1");
    sqlx::query(&sql).bind(reference).execute(store.orders.db().pool()).await.expect("Error backdating row");
}
