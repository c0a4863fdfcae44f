use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use reach_core::config::AppConfig;
use reach_core::InMemoryStore;
use reach_management::{management_router, ManagementState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const USER: &str = "user-1";

fn app() -> Router {
    let mut config = AppConfig::default();
    config.delivery.step_interval_ms = 1;
    config.delivery.steps = 4;
    let state = ManagementState::new(&config, Arc::new(InMemoryStore::new()));
    management_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", USER);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_customers(app: &Router) {
    let customers = json!([
        {"name": "Asha", "email": "asha@x.io", "totalSpends": 15000, "visits": 6},
        {"name": "Ravi", "email": "ravi@x.io", "totalSpends": 800, "visits": 1},
        {"name": "Meera", "email": "meera@gmail.com", "totalSpends": 11000, "visits": 3},
    ]);
    let (status, body) = send(app, "POST", "/api/data/customers", Some(customers)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["created"], 3);
}

#[tokio::test]
async fn health_probes_need_no_identity() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/campaigns")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn preview_counts_matching_customers() {
    let app = app();
    seed_customers(&app).await;

    let rules = json!({"rules": [
        {"id": 1, "field": "totalSpends", "operator": ">", "value": "10000", "logicalOperator": null}
    ]});
    let (status, body) = send(&app, "POST", "/api/campaigns/preview", Some(rules)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["preview"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn create_campaign_requires_name_rules_and_message() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/campaigns",
        Some(json!({"name": "No message", "rules": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");

    let (_, list) = send(&app, "GET", "/api/campaigns", None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn campaign_runs_to_completion() {
    let app = app();
    seed_customers(&app).await;

    let req = json!({
        "name": "Big spenders",
        "rules": [{"id": 1, "field": "totalSpends", "operator": ">", "value": 10000}],
        "message": "Hi {name}, here is 10% off",
        "audienceSize": 2
    });
    let (status, body) = send(&app, "POST", "/api/campaigns", Some(req)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["campaign"]["audienceSize"], 2);
    assert_eq!(body["campaign"]["status"], "ACTIVE");
    let id = body["campaign"]["id"].as_str().unwrap().to_string();

    let mut campaign = Value::Null;
    for _ in 0..200 {
        let (_, c) = send(&app, "GET", &format!("/api/campaigns/{id}"), None).await;
        if c["status"] == "COMPLETED" {
            campaign = c;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(campaign["status"], "COMPLETED");
    assert_eq!(campaign["sentCount"], 1);
    assert_eq!(campaign["failedCount"], 1);
    assert_eq!(campaign["deliveryStats"]["pending"], 0);

    let (_, logs) = send(&app, "GET", &format!("/api/campaigns/{id}/logs"), None).await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs[0]["personalizedMessage"]
        .as_str()
        .unwrap()
        .starts_with("Hi "));

    let (status, body) = send(&app, "POST", &format!("/api/campaigns/{id}/reconcile"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deliveryStats"]["sent"], 1);
    assert_eq!(body["deliveryStats"]["failed"], 1);
}

#[tokio::test]
async fn unknown_campaign_is_not_found() {
    let app = app();
    let uri = format!("/api/campaigns/{}/trigger-delivery", uuid::Uuid::new_v4());
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn orders_update_customer_totals() {
    let app = app();
    seed_customers(&app).await;

    let orders = json!([
        {"customerEmail": "ravi@x.io", "orderAmount": 200},
        {"customerEmail": "ghost@x.io", "orderAmount": 50}
    ]);
    let (status, body) = send(&app, "POST", "/api/data/orders", Some(orders)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["created"], 1);
    assert_eq!(body["summary"]["errors"], 1);
    assert_eq!(body["results"][1]["status"], "error");

    let (_, list) = send(&app, "GET", "/api/data/customers?search=ravi", None).await;
    assert_eq!(list["customers"][0]["totalSpends"], 1000.0);
    assert_eq!(list["customers"][0]["visits"], 2);

    let (_, stats) = send(&app, "GET", "/api/data/stats", None).await;
    assert_eq!(stats["customers"]["total"], 3);
    assert_eq!(stats["orders"]["total"], 1);
}

#[tokio::test]
async fn convert_rules_uses_pattern_table() {
    let app = app();
    let prompt = "customers who spent more than 5000 or frequent shoppers";
    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/convert-rules",
        Some(json!({"prompt": prompt})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["originalPrompt"], prompt);
    assert_eq!(body["confidence"], 0.9);
    assert_eq!(body["source"], "Pattern-matching");
    let rules = body["rules"].as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["field"], "totalSpends");
    assert_eq!(rules[1]["logicalOperator"], "OR");

    let (status, _) = send(&app, "POST", "/api/ai/convert-rules", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_messages_picks_segment_templates() {
    let app = app();
    let req = json!({
        "rules": [{"id": 1, "field": "lastVisit", "operator": ">", "value": "60"}],
        "campaignObjective": "winback"
    });
    let (status, body) = send(&app, "POST", "/api/ai/generate-messages", Some(req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["objective"], "winback");
    assert_eq!(body["rulesAnalyzed"], 1);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["variant"], "Win-back");

    let (status, _) = send(&app, "POST", "/api/ai/generate-messages", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_ingestion_record_does_not_reject_the_batch() {
    let app = app();
    let customers = json!([
        {"name": "Good", "email": "good@x.io"},
        {"name": "Bad", "email": "bad@x.io", "visits": -1},
        {"name": "Neg", "email": "neg@x.io", "totalSpends": -500}
    ]);
    let (status, body) = send(&app, "POST", "/api/data/customers", Some(customers)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total"], 3);
    assert_eq!(body["summary"]["created"], 1);
    assert_eq!(body["summary"]["errors"], 2);
    assert_eq!(body["results"][1]["status"], "error");
    assert_eq!(body["results"][1]["email"], "bad@x.io");

    let orders = json!([
        {"customerEmail": "good@x.io", "orderAmount": "n/a"},
        {"customerEmail": "good@x.io", "orderAmount": 25}
    ]);
    let (status, body) = send(&app, "POST", "/api/data/orders", Some(orders)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["created"], 1);
    assert_eq!(body["summary"]["errors"], 1);
}

#[tokio::test]
async fn unknown_connector_is_treated_as_and() {
    let app = app();
    seed_customers(&app).await;

    let rules = json!({"rules": [
        {"id": 1, "field": "totalSpends", "operator": ">", "value": "10000", "logicalOperator": null},
        {"id": 2, "field": "visits", "operator": ">", "value": "5", "logicalOperator": ""}
    ]});
    let (status, body) = send(&app, "POST", "/api/campaigns/preview", Some(rules)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["preview"][0]["email"], "asha@x.io");
}

#[tokio::test]
async fn dashboard_reports_totals_and_trends() {
    let app = app();
    seed_customers(&app).await;
    let orders = json!({"customerEmail": "asha@x.io", "orderAmount": 400});
    send(&app, "POST", "/api/data/orders", Some(orders)).await;

    let (status, stats) = send(&app, "GET", "/api/dashboard/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalCustomers"], 3);
    assert_eq!(stats["totalOrders"], 1);
    assert_eq!(stats["totalCampaigns"], 0);
    assert_eq!(stats["campaignStats"]["sent"], 0);
    assert_eq!(stats["recentActivity"]["customers"].as_array().unwrap().len(), 3);
    assert_eq!(stats["recentActivity"]["orders"][0]["orderAmount"], 400.0);

    let (status, analytics) = send(&app, "GET", "/api/dashboard/analytics?period=7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["period"], 7);
    assert_eq!(analytics["customerGrowth"][0]["count"], 3);
    assert_eq!(analytics["revenueTrends"][0]["revenue"], 400.0);
    assert_eq!(analytics["topCustomers"][0]["email"], "asha@x.io");
    assert_eq!(analytics["topCustomers"][0]["totalSpends"], 15400.0);
}
