// Integration tests: HTTP and WebSocket endpoints over a scripted engine

mod common;

use axum_test::TestServer;
use common::{FakeRunner, command_failure, listing_key};
use dockside::inventory::Inventory;
use dockside::models::EntityKind;
use dockside::routes;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

fn test_app(runner: &Arc<FakeRunner>) -> (axum::Router, Arc<Inventory>) {
    let inventory = Arc::new(common::inventory(runner));
    let app = routes::app(inventory.clone(), Arc::new(AtomicUsize::new(0)));
    (app, inventory)
}

fn test_server(runner: &Arc<FakeRunner>) -> TestServer {
    let (app, _) = test_app(runner);
    TestServer::new(app)
}

#[tokio::test]
async fn test_version_endpoint() {
    let server = test_server(&FakeRunner::new());
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("dockside"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_list_containers_fetches_on_first_use() {
    let runner = FakeRunner::new().with_fixtures();
    let server = test_server(&runner);

    let response = server.get("/api/containers").await;
    response.assert_status_ok();
    let json: Value = response.json();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["id"], "abc123");
    assert_eq!(items[0]["state"], "running");
    assert_eq!(items[0]["image"]["tag"], "latest");
    assert!(json["fetchedAt"].is_string());

    server.get("/api/containers").await.assert_status_ok();
    assert_eq!(runner.call_count(&listing_key(EntityKind::Containers)), 1);
}

#[tokio::test]
async fn test_unknown_kind_is_not_found() {
    let server = test_server(&FakeRunner::new());
    let response = server.get("/api/pods").await;
    response.assert_status_not_found();
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("pods"));
}

#[tokio::test]
async fn test_refresh_endpoint_refetches() {
    let runner = FakeRunner::new().with_fixtures();
    let server = test_server(&runner);
    server.get("/api/volumes").await.assert_status_ok();
    server.post("/api/volumes/refresh").await.assert_status_ok();
    assert_eq!(runner.call_count(&listing_key(EntityKind::Volumes)), 2);
}

#[tokio::test]
async fn test_engine_failure_maps_to_bad_gateway() {
    let runner = FakeRunner::new();
    runner.respond_listing(
        EntityKind::Images,
        Err(command_failure("images", "Cannot connect to the Docker daemon")),
    );
    let server = test_server(&runner);
    let response = server.get("/api/images").await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("Cannot connect"));
}

#[tokio::test]
async fn test_container_tree_has_group_headers() {
    let server = test_server(&FakeRunner::new().with_fixtures());
    let response = server.get("/api/containers/tree").await;
    response.assert_status_ok();
    let tree: Value = response.json();
    assert_eq!(tree[0]["label"], "Running (2)");
    assert_eq!(tree[0]["kind"]["type"], "group");
    assert_eq!(tree[1]["label"], "Stopped (1)");
    assert_eq!(tree[0]["children"][0]["kind"]["id"], "abc123");
}

#[tokio::test]
async fn test_empty_listing_tree_is_placeholder() {
    let runner = FakeRunner::new();
    runner.respond_listing(EntityKind::Networks, Ok(String::new()));
    let server = test_server(&runner);
    let tree: Value = server.get("/api/networks/tree").await.json();
    assert_eq!(tree[0]["label"], "No networks found");
}

#[tokio::test]
async fn test_operations_catalogue_flags_destructive_ops() {
    let server = test_server(&FakeRunner::new());
    let catalogue: Vec<Value> = server.get("/api/operations").await.json();
    assert_eq!(catalogue.len(), 15);
    let confirmed: Vec<&str> = catalogue
        .iter()
        .filter(|op| op["requiresConfirmation"] == true)
        .filter_map(|op| op["operation"].as_str())
        .collect();
    assert_eq!(
        confirmed,
        [
            "remove-container",
            "remove-image",
            "prune-containers",
            "prune-images",
            "prune-volumes",
            "prune-networks",
            "prune-all"
        ]
    );
}

#[tokio::test]
async fn test_unconfirmed_remove_gets_428_with_warning() {
    let runner = FakeRunner::new().with_fixtures();
    let server = test_server(&runner);
    let response = server
        .post("/api/operations")
        .json(&json!({ "operation": "remove-container", "identifier": "web" }))
        .await;
    response.assert_status(axum::http::StatusCode::PRECONDITION_REQUIRED);
    let json: Value = response.json();
    assert_eq!(
        json["warning"]["message"],
        "Are you sure you want to remove container \"web\"?"
    );
    assert_eq!(json["warning"]["level"], "irreversible");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_confirmed_operation_returns_outcome() {
    let runner = FakeRunner::new().with_fixtures();
    runner.respond("volume prune -f", Ok("Total reclaimed space: 1.2GB\n".into()));
    let server = test_server(&runner);
    let response = server
        .post("/api/operations")
        .json(&json!({ "operation": "prune-volumes", "confirmed": true }))
        .await;
    response.assert_status_ok();
    let outcome: Value = response.json();
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["message"], "Unused volumes pruned");
    assert_eq!(outcome["refreshed"], json!(["volumes"]));
}

#[tokio::test]
async fn test_bad_arguments_are_400() {
    let server = test_server(&FakeRunner::new());
    let response = server
        .post("/api/operations")
        .json(&json!({ "operation": "stop", "identifier": "--all" }))
        .await;
    response.assert_status_bad_request();

    let response = server
        .post("/api/operations")
        .json(&json!({ "operation": "tag", "identifier": "nginx" }))
        .await;
    response.assert_status_bad_request();
}

// --- WebSocket tests (require http_transport + ws feature) ---
// Receive until a JSON text of the wanted shape arrives (server may send Ping first).

async fn receive_json_where(
    ws: &mut axum_test::TestWebSocket,
    wanted: impl Fn(&Value) -> bool,
) -> Value {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(v) = serde_json::from_str::<Value>(&text)
            && wanted(&v)
        {
            return v;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for JSON"
        );
    }
}

#[tokio::test]
async fn test_ws_events_streams_snapshot_replacements() {
    let runner = FakeRunner::new().with_fixtures();
    let (app, inventory) = test_app(&runner);
    let server = TestServer::builder().http_transport().build(app);
    let mut ws = server
        .get_websocket("/ws/events")
        .await
        .into_websocket()
        .await;
    let welcome = receive_json_where(&mut ws, |v| v["type"] == "connected").await;
    assert!(welcome["version"].is_string());

    inventory.refresh(EntityKind::Volumes).await.unwrap();
    let event = receive_json_where(&mut ws, |v| v["type"] == "snapshotReplaced").await;
    assert_eq!(event["kind"], "volumes");
    assert_eq!(event["count"], 2);
    assert!(event["fetchedAt"].is_string());
}
