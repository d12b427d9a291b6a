//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use storebot_engine::{
    db_types::OrderId,
    helpers::parse_credential_lines,
    order_objects::{ModifyOrderRequest, OrderQueryFilter},
    DepositApi,
    OrderFlowApi,
    PaymentGateway,
    PaymentNotification,
    StorefrontDatabase,
    WebhookReconciler,
};

use crate::{
    data_objects::{CredentialImportRequest, CredentialImportResult, HistoryParams, JsonResponse, QrisWebhookPayload},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(qris_webhook => Post "/qris" impl StorefrontDatabase, PaymentGateway);
/// Route handler for payment notifications from the QRIS aggregator.
///
/// The payload is either a referenced status update or a relayed free-text notification; the reconciler
/// figures out which charge it belongs to and settles or annuls it. Unknown references and unmatched amounts
/// are 404s so that the aggregator retries them later.
pub async fn qris_webhook<B: StorefrontDatabase, G: PaymentGateway>(
    body: web::Json<QrisWebhookPayload>,
    reconciler: web::Data<WebhookReconciler<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payload = body.into_inner();
    debug!("🪝️ Webhook notification received: {payload:?}");
    let notification = PaymentNotification::try_from(payload)?;
    let outcome = reconciler.handle(notification).await?;
    info!("🪝️ {}", outcome.describe());
    Ok(HttpResponse::Ok().json(JsonResponse::success(outcome.describe())))
}

//----------------------------------------------   Catalogue  ----------------------------------------------------
route!(products => Get "/products" impl StorefrontDatabase, PaymentGateway);
pub async fn products<B: StorefrontDatabase, G: PaymentGateway>(
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET products");
    let products = api.fetch_active_products().await?;
    Ok(HttpResponse::Ok().json(products))
}

route!(stock => Get "/stock/{product_id}" impl StorefrontDatabase, PaymentGateway);
pub async fn stock<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ GET stock for product {product_id}");
    let available = api.available_stock(product_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "product_id": product_id, "available": available })))
}

route!(import_credentials => Post "/credentials" impl StorefrontDatabase, PaymentGateway);
/// Bulk-imports credentials for a product from pipe-delimited text, one credential per line. Malformed lines
/// are skipped and reported, not rejected.
pub async fn import_credentials<B: StorefrontDatabase, G: PaymentGateway>(
    body: web::Json<CredentialImportRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST credential import for product {}", req.product_id);
    let (credentials, skipped) = parse_credential_lines(req.product_id, &req.text);
    if credentials.is_empty() {
        return Err(ServerError::InvalidRequestBody("No valid credential lines in the import".into()));
    }
    let imported = api.import_credentials(credentials).await?;
    info!("💻️ Imported {imported} credential(s) for product {}. {skipped} line(s) skipped", req.product_id);
    Ok(HttpResponse::Ok().json(CredentialImportResult { imported, skipped }))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl StorefrontDatabase, PaymentGateway);
pub async fn order_by_id<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} not found")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(orders_search => Get "/search/orders" impl StorefrontDatabase, PaymentGateway);
pub async fn orders_search<B: StorefrontDatabase, G: PaymentGateway>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET orders search for [{query:?}]");
    let orders = api.search_orders(query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(update_order => Patch "/orders/{order_id}" impl StorefrontDatabase, PaymentGateway);
/// Applies an admin's manual change to an order. This bypasses the pending-only transition guard, so it is
/// the escape hatch for reconciling charges the automation could not.
pub async fn update_order<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<String>,
    body: web::Json<ModifyOrderRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let update = body.into_inner();
    debug!("💻️ PATCH order {order_id}: {update:?}");
    let order = api.update_order(&order_id, update).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Balances  ----------------------------------------------------
route!(balance => Get "/balance/{user_id}" impl StorefrontDatabase, PaymentGateway);
pub async fn balance<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<i64>,
    api: web::Data<DepositApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET balance for user {user_id}");
    let balance = api.balance(user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user_id": user_id, "balance": balance })))
}

route!(history => Get "/history/{user_id}" impl StorefrontDatabase, PaymentGateway);
pub async fn history<B: StorefrontDatabase, G: PaymentGateway>(
    path: web::Path<i64>,
    params: web::Query<HistoryParams>,
    api: web::Data<DepositApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET history for user {user_id}");
    let entries = api.history(user_id, params.limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}
