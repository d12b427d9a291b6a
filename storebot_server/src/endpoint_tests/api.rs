use actix_web::{http::StatusCode, test, test::TestRequest, App};
use serde_json::json;
use storebot_engine::db_types::Product;

use super::helpers::{configure, order_api, seed_product, setup, tear_down};
use crate::data_objects::CredentialImportResult;

#[actix_web::test]
async fn products_lists_only_active_entries() {
    let (db, gateway) = setup().await;
    let api = order_api(&db, &gateway);
    seed_product(&api, "vpn", 25_000, 2).await;
    let retired = seed_product(&api, "old", 10_000, 1).await;
    api.retire_product(retired.id).await.expect("Error retiring product");

    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let req = TestRequest::get().uri("/api/products").to_request();
    let products: Vec<Product> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "vpn");
    tear_down(db).await;
}

#[actix_web::test]
async fn stock_reports_the_unsold_pool() {
    let (db, gateway) = setup().await;
    let api = order_api(&db, &gateway);
    let product = seed_product(&api, "music", 15_000, 7).await;

    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let req = TestRequest::get().uri(&format!("/api/stock/{}", product.id)).to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["available"], json!(7));
    tear_down(db).await;
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let (db, gateway) = setup().await;
    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let req = TestRequest::get().uri("/api/orders/ORD-NOPE").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    tear_down(db).await;
}

#[actix_web::test]
async fn credential_import_skips_malformed_lines() {
    let (db, gateway) = setup().await;
    let api = order_api(&db, &gateway);
    let product = seed_product(&api, "vpn", 25_000, 0).await;

    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let payload = json!({
        "product_id": product.id,
        "text": "alice@mail.test|hunter2\nmissing-password\nbob@mail.test|pass|left seat",
    });
    let req = TestRequest::post().uri("/api/credentials").set_json(&payload).to_request();
    let result: CredentialImportResult = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.imported, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(api.available_stock(product.id).await.unwrap(), 2);
    tear_down(db).await;
}

#[actix_web::test]
async fn balance_defaults_to_zero_for_new_users() {
    let (db, gateway) = setup().await;
    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let req = TestRequest::get().uri("/api/balance/424242").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["balance"], json!(0));
    tear_down(db).await;
}
