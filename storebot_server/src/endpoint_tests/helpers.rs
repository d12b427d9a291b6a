use actix_web::{web, web::ServiceConfig};
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

use crate::routes::{
    BalanceRoute,
    HistoryRoute,
    ImportCredentialsRoute,
    OrderByIdRoute,
    OrdersSearchRoute,
    ProductsRoute,
    QrisWebhookRoute,
    StockRoute,
    UpdateOrderRoute,
};

pub type TestOrderApi = OrderFlowApi<SqliteDatabase, MockGateway>;

pub async fn setup() -> (SqliteDatabase, MockGateway) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let gateway = MockGateway::new().with_uniquifier(101);
    (db, gateway)
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    drop(db);
    Sqlite::drop_database(&url).await.ok();
}

/// Registers the full route table against the test backend, mirroring what `create_server_instance` does.
pub fn configure(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let producers = EventProducers::default();
        let orders = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let deposits = DepositApi::new(db, gateway, producers);
        let reconciler = WebhookReconciler::new(orders.clone(), deposits.clone());
        let api_scope = web::scope("/api")
            .service(ProductsRoute::<SqliteDatabase, MockGateway>::new())
            .service(StockRoute::<SqliteDatabase, MockGateway>::new())
            .service(ImportCredentialsRoute::<SqliteDatabase, MockGateway>::new())
            .service(OrderByIdRoute::<SqliteDatabase, MockGateway>::new())
            .service(OrdersSearchRoute::<SqliteDatabase, MockGateway>::new())
            .service(UpdateOrderRoute::<SqliteDatabase, MockGateway>::new())
            .service(BalanceRoute::<SqliteDatabase, MockGateway>::new())
            .service(HistoryRoute::<SqliteDatabase, MockGateway>::new());
        let webhook_scope = web::scope("/webhook").service(QrisWebhookRoute::<SqliteDatabase, MockGateway>::new());
        cfg.app_data(web::Data::new(orders))
            .app_data(web::Data::new(deposits))
            .app_data(web::Data::new(reconciler))
            .service(api_scope)
            .service(webhook_scope);
    }
}

pub fn order_api(db: &SqliteDatabase, gateway: &MockGateway) -> TestOrderApi {
    OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default())
}

/// Creates an active product with the given number of unsold credentials in its pool.
pub async fn seed_product(api: &TestOrderApi, name: &str, price: i64, stock: i64) -> Product {
    let product = api.add_product(NewProduct::new(name, Rupiah::from(price))).await.expect("Error creating product");
    let creds = (0..stock)
        .map(|i| NewCredential::new(product.id, format!("{name}_user{i}@mail.test"), format!("pass{i}")))
        .collect::<Vec<_>>();
    let n = api.import_credentials(creds).await.expect("Error importing credentials");
    assert_eq!(n, stock as u64);
    product
}
