use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use storebot_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    DepositApi,
    OrderFlowApi,
    SqliteDatabase,
    WebhookReconciler,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::qris::QrisGateway,
    routes::{
        health,
        BalanceRoute,
        HistoryRoute,
        ImportCredentialsRoute,
        OrderByIdRoute,
        OrdersSearchRoute,
        ProductsRoute,
        QrisWebhookRoute,
        StockRoute,
        UpdateOrderRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = QrisGateway::from_config(config.qris_config.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(25, EventHooks::default());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let orders = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
    let deposits = DepositApi::new(db.clone(), gateway.clone(), producers.clone());
    let sweeper = start_expiry_worker(orders, deposits, config.pending_ttl, config.sweep_interval_secs);
    let srv = create_server_instance(config, db, gateway, producers)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    sweeper.abort();
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: QrisGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    info!("🚀️ Listening on {}:{}", config.host, config.port);
    let srv = HttpServer::new(move || {
        // The per-worker API instances share the pool and the gateway client through their inner Arcs.
        let orders_api = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let deposits_api = DepositApi::new(db.clone(), gateway.clone(), producers.clone());
        let reconciler = WebhookReconciler::new(orders_api.clone(), deposits_api.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sbt::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(deposits_api))
            .app_data(web::Data::new(reconciler));
        let api_scope = web::scope("/api")
            .service(ProductsRoute::<SqliteDatabase, QrisGateway>::new())
            .service(StockRoute::<SqliteDatabase, QrisGateway>::new())
            .service(ImportCredentialsRoute::<SqliteDatabase, QrisGateway>::new())
            .service(OrderByIdRoute::<SqliteDatabase, QrisGateway>::new())
            .service(OrdersSearchRoute::<SqliteDatabase, QrisGateway>::new())
            .service(UpdateOrderRoute::<SqliteDatabase, QrisGateway>::new())
            .service(BalanceRoute::<SqliteDatabase, QrisGateway>::new())
            .service(HistoryRoute::<SqliteDatabase, QrisGateway>::new());
        let webhook_scope =
            web::scope("/webhook").service(QrisWebhookRoute::<SqliteDatabase, QrisGateway>::new());
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
