use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use kitroom_api::app::{self, services::AppServices};
use kitroom_infra::{AppConfig, CatalogService, Clock, InMemoryStorage, SystemClock};
use kitroom_inventory::{NewItem, NewUser};

struct TestServer {
    base_url: String,
    catalog: CatalogService<InMemoryStorage>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config = AppConfig {
            locations: "san_jose,2u".to_string(),
            ..AppConfig::default()
        };

        // Same router as prod, bound to an ephemeral port.
        let services = AppServices::new(storage.clone(), clock.clone(), &config);
        let app = app::build_app(services, &config.cors_origin_list());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Seeding goes straight to the catalog; the HTTP surface has no
        // create endpoints.
        let catalog = CatalogService::new(storage, clock);
        Self {
            base_url,
            catalog,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed_item(&self, name: &str, total: i32) -> String {
        self.catalog
            .create_item(NewItem::new(name, "Power Tools", "san_jose", total))
            .await
            .unwrap()
            .id
            .to_string()
    }

    async fn seed_user(&self, ldap: &str) -> String {
        self.catalog
            .create_user(NewUser::new(ldap, format!("User {ldap}")))
            .await
            .unwrap()
            .id
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn checkout(client: &reqwest::Client, srv: &TestServer, body: Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url("/api/checkout"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_and_index_respond() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    let res = client.get(srv.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["endpoints"]["checkout"]["checkin"].is_string());
}

#[tokio::test]
async fn checkout_lifecycle_by_ldap() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let item_id = srv.seed_item("Cordless Drill", 10).await;
    srv.seed_user("jdoe").await;

    let (status, body) = checkout(
        &client,
        &srv,
        json!({ "item_id": item_id, "user_ldap": "jdoe", "quantity": 2, "notes": "site visit" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body={body}");
    let checkout_id = body["checkout"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["checkout"]["condition_at_checkout"], "good");

    let res = client
        .get(srv.url(&format!("/api/inventory/{item_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let item: Value = res.json().await.unwrap();
    assert_eq!(item["item"]["quantity_available"], 8);
    assert_eq!(item["item"]["quantity_checked_out"], 2);

    let active: Value = client
        .get(srv.url("/api/checkout/active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active["total_active_checkouts"], 1);
    assert_eq!(active["checkouts"][0]["user"]["ldap"], "jdoe");
    assert_eq!(active["checkouts"][0]["item"]["name"], "Cordless Drill");
    assert_eq!(active["checkouts"][0]["is_overdue"], false);

    let res = client
        .post(srv.url("/api/checkout/checkin"))
        .json(&json!({ "checkout_id": checkout_id, "return_condition": "worn" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let closed: Value = res.json().await.unwrap();
    assert_eq!(closed["history"]["is_returned"], true);
    assert_eq!(closed["history"]["late_return"], false);
    assert_eq!(closed["history"]["return_condition"], "worn");

    let history: Value = client
        .get(srv.url("/api/checkout/user/jdoe?limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["total_records"], 1);
    assert_eq!(history["user"]["ldap"], "jdoe");
    assert_eq!(history["history"][0]["item"]["name"], "Cordless Drill");

    let res = client
        .post(srv.url("/api/checkout/checkin"))
        .json(&json!({ "checkout_id": checkout_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "checkout_not_found");
}

#[tokio::test]
async fn checkout_errors_map_to_statuses() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let item_id = srv.seed_item("Laser Level", 1).await;
    let user_id = srv.seed_user("jdoe").await;

    let (status, body) = checkout(
        &client,
        &srv,
        json!({ "item_id": item_id, "user_id": user_id, "quantity": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_quantity");

    let (status, body) = checkout(
        &client,
        &srv,
        json!({ "item_id": item_id, "user_id": user_id, "quantity": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");

    let (status, body) = checkout(
        &client,
        &srv,
        json!({ "item_id": item_id, "user_ldap": "ghost" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user_not_found");

    let (status, body) = checkout(&client, &srv, json!({ "item_id": item_id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = checkout(
        &client,
        &srv,
        json!({ "item_id": "42", "user_id": user_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = checkout(
        &client,
        &srv,
        json!({
            "item_id": item_id,
            "user_id": user_id,
            "expected_return_datetime": "tomorrow-ish",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url(&format!("/api/inventory/{}", kitroom_core::ItemId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overdue_checkouts_are_listed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let item_id = srv.seed_item("Generator", 4).await;
    let user_id = srv.seed_user("jdoe").await;

    let past_due = (Utc::now() - ChronoDuration::days(3) - ChronoDuration::hours(1)).to_rfc3339();
    let (status, _) = checkout(
        &client,
        &srv,
        json!({ "item_id": item_id, "user_id": user_id, "expected_return_datetime": past_due }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = checkout(&client, &srv, json!({ "item_id": item_id, "user_id": user_id })).await;
    assert_eq!(status, StatusCode::CREATED);

    let overdue: Value = client
        .get(srv.url("/api/checkout/overdue"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overdue["total_overdue"], 1);
    assert_eq!(overdue["checkouts"][0]["days_overdue"], 3);

    let by_item: Value = client
        .get(srv.url(&format!("/api/checkout/active?item_id={item_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_item["total_active_checkouts"], 2);

    let history: Value = client
        .get(srv.url(&format!("/api/checkout/item/{item_id}/history?limit=1")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["total_records"], 1);
}

#[tokio::test]
async fn inventory_listing_and_search() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.seed_item("Cordless Drill", 10).await;
    srv.seed_item("Drill Bit Set", 0).await;
    srv.seed_user("jdoe").await;

    let res = client
        .get(srv.url("/api/inventory?location=san_jose&ldap=jdoe"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total_items"], 2);
    assert_eq!(body["user"]["ldap"], "jdoe");
    assert_eq!(body["items"][0]["availability_status"], "Available");
    assert_eq!(body["items"][1]["availability_status"], "Out of Stock");

    let res = client
        .get(srv.url("/api/inventory?location=san_jose&ldap=ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/api/inventory?location=mars"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/api/inventory")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = client
        .get(srv.url("/api/inventory/search?q=drill"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_results"], 2);

    let res = client
        .get(srv.url("/api/inventory/search?q="))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
