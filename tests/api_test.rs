//! HTTP-level tests against an in-memory store.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use bigdecimal::BigDecimal;
use serde_json::{json, Value};

use storefront_service::build_state;
use storefront_service::domain::variant::{Product, Size, VariantKey};
use storefront_service::handlers;
use storefront_service::infrastructure::memory_store::MemoryStore;

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_product(Product {
        id: 4,
        name: "Boots".to_string(),
        slug: "boots".to_string(),
        price: BigDecimal::from_str("120.00").unwrap(),
    });
    store.add_product(Product {
        id: 59,
        name: "Mug".to_string(),
        slug: "mug".to_string(),
        price: BigDecimal::from_str("7.50").unwrap(),
    });
    store.stock(VariantKey::new(4, Size::sized("47")), 1).unwrap();
    store.stock(VariantKey::new(4, Size::sized("48")), 2).unwrap();
    store.stock(VariantKey::new(59, Size::Unsized), 1).unwrap();
    store
}

macro_rules! app {
    ($store:expr) => {
        test::init_service(
            App::new()
                .app_data(build_state($store.clone(), Duration::from_secs(5)))
                .configure(handlers::configure),
        )
        .await
    };
}

fn checkout_body(user_id: i64) -> Value {
    json!({
        "user_id": user_id,
        "surname": "Petrov",
        "name": "Ivan",
        "middle_name": "Ivanovich",
        "address": "1 Nevsky Prospect",
        "phone_number": "+7 912 345-67-89"
    })
}

#[actix_web::test]
async fn add_then_list_cart() {
    let store = seeded_store();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "user_id": 1, "product_id": 4, "size": "48" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let line: Value = test::read_body_json(resp).await;
    assert_eq!(line["size"], "48");
    assert_eq!(line["reserved"], 1);

    let req = test::TestRequest::get().uri("/cart?user_id=1").to_request();
    let cart: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cart["total_quantity"], 1);
    assert_eq!(cart["items"][0]["product_name"], "Boots");
    assert_eq!(store.available(&VariantKey::new(4, Size::sized("48"))), Some(1));
}

#[actix_web::test]
async fn choosable_sizes_exclude_held_size() {
    let store = seeded_store();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "user_id": 1, "product_id": 4, "size": "47" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/products/4/sizes?user_id=1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sizes"], json!(["48"]));

    let req = test::TestRequest::get()
        .uri("/products/4/sizes?user_id=2")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sizes"], json!(["48"]), "size 47 is sold out");
}

#[actix_web::test]
async fn sold_out_add_is_conflict() {
    let store = seeded_store();
    let app = app!(store);

    for (user_id, expected) in [(1, StatusCode::CREATED), (2, StatusCode::CONFLICT)] {
        let req = test::TestRequest::post()
            .uri("/cart/items")
            .set_json(json!({ "user_id": user_id, "product_id": 59 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), expected);
    }
    assert_eq!(store.available(&VariantKey::new(59, Size::Unsized)), Some(0));
}

#[actix_web::test]
async fn increase_when_sold_out_still_succeeds() {
    let store = seeded_store();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "user_id": 1, "product_id": 59, "size": "" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/cart/items/increase")
        .set_json(json!({ "user_id": 1, "product_id": 59 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let line: Value = test::read_body_json(resp).await;
    assert_eq!(line["reserved"], 1);
}

#[actix_web::test]
async fn remove_missing_line_is_404_and_remove_restores_stock() {
    let store = seeded_store();
    let app = app!(store);

    let req = test::TestRequest::delete()
        .uri("/cart/items?user_id=1&product_id=4&size=48")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "user_id": 1, "product_id": 4, "size": "48" }))
        .to_request();
    test::call_service(&app, req).await;
    let req = test::TestRequest::delete()
        .uri("/cart/items?user_id=1&product_id=4&size=48")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.available(&VariantKey::new(4, Size::sized("48"))), Some(2));
}

#[actix_web::test]
async fn checkout_creates_order_and_empties_cart() {
    let store = seeded_store();
    let app = app!(store);

    let req = test::TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "user_id": 1, "product_id": 4, "size": "48" }))
        .to_request();
    test::call_service(&app, req).await;
    let req = test::TestRequest::post()
        .uri("/cart/items/increase")
        .set_json(json!({ "user_id": 1, "product_id": 4, "size": "48" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/checkout")
        .set_json(checkout_body(1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let order_id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri("/cart?user_id=1").to_request();
    let cart: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cart["items"], json!([]));

    let req = test::TestRequest::get()
        .uri(&format!("/orders/{order_id}"))
        .to_request();
    let order: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(order["status"], "IN_TRANSIT");
    assert_eq!(order["lines"][0]["quantity"], 2);
    assert_eq!(order["lines"][0]["size"], "48");
    assert_eq!(
        BigDecimal::from_str(order["total_price"].as_str().unwrap()).unwrap(),
        BigDecimal::from(240)
    );

    let req = test::TestRequest::post()
        .uri(&format!("/orders/{order_id}/delivered"))
        .to_request();
    let order: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(order["status"], "DELIVERED");
}

#[actix_web::test]
async fn checkout_with_bad_fields_is_422_with_messages() {
    let store = seeded_store();
    let app = app!(store);

    let mut body = checkout_body(1);
    body["name"] = json!("R2D2");
    let req = test::TestRequest::post()
        .uri("/checkout")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["fields"][0]["field"], "name");
}

#[actix_web::test]
async fn unknown_order_is_404() {
    let store = seeded_store();
    let app = app!(store);

    let req = test::TestRequest::get()
        .uri("/orders/00000000-0000-0000-0000-000000000000")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
