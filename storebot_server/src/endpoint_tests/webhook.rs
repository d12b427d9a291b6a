use actix_web::{http::StatusCode, test, test::TestRequest, App};
use serde_json::json;
use storebot_engine::{db_types::PaymentStatus, order_objects::CheckoutRequest};

use super::helpers::{configure, order_api, seed_product, setup, tear_down};

#[actix_web::test]
async fn referenced_notification_settles_an_order() {
    let (db, gateway) = setup().await;
    let api = order_api(&db, &gateway);
    let product = seed_product(&api, "vpn", 25_000, 3).await;
    let req = CheckoutRequest::new(100, product.id, 1);
    let (order, _charge) = api.checkout_with_qris(req).await.expect("Error checking out");

    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let payload = json!({ "order_id": order.order_id.as_str(), "status": "completed" });
    let req = TestRequest::post().uri("/webhook/qris").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let settled = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Paid);
    tear_down(db).await;
}

#[actix_web::test]
async fn free_text_notification_matches_by_amount() {
    let (db, gateway) = setup().await;
    let api = order_api(&db, &gateway);
    let product = seed_product(&api, "music", 50_000, 2).await;
    let req = CheckoutRequest::new(200, product.id, 1);
    // The mock adds a 101 uniquifier, so the charge is for Rp50.101.
    let (order, charge) = api.checkout_with_qris(req).await.expect("Error checking out");
    assert_eq!(charge.amount_due.value(), 50_101);

    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let payload = json!({ "message": "Pembayaran Rp 50.101 dari BUDI SANTOSO berhasil" });
    let req = TestRequest::post().uri("/webhook/qris").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let settled = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Paid);
    tear_down(db).await;
}

#[actix_web::test]
async fn unmatched_amounts_are_rejected() {
    let (db, gateway) = setup().await;
    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let payload = json!({ "message": "Pembayaran Rp 999.999 dari SITI berhasil" });
    let req = TestRequest::post().uri("/webhook/qris").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    tear_down(db).await;
}

#[actix_web::test]
async fn garbled_payloads_are_bad_requests() {
    let (db, gateway) = setup().await;
    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    // Neither a reference+status pair nor a message.
    let payload = json!({ "status": "completed" });
    let req = TestRequest::post().uri("/webhook/qris").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    tear_down(db).await;
}

#[actix_web::test]
async fn late_notifications_for_settled_orders_are_acknowledged() {
    let (db, gateway) = setup().await;
    let api = order_api(&db, &gateway);
    let product = seed_product(&api, "cloud", 10_000, 2).await;
    let req = CheckoutRequest::new(300, product.id, 1);
    let (order, _) = api.checkout_with_qris(req).await.expect("Error checking out");
    api.confirm_payment(&order.order_id).await.expect("Error settling order");

    // The provider retries the webhook; the repeat must not allocate again.
    let app = test::init_service(App::new().configure(configure(db.clone(), gateway))).await;
    let payload = json!({ "order_id": order.order_id.as_str(), "status": "completed" });
    let req = TestRequest::post().uri("/webhook/qris").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(api.available_stock(product.id).await.unwrap(), 1);
    tear_down(db).await;
}
