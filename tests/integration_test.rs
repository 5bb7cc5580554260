use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use route_relay::api::create_api_server;
use route_relay::service::{RouteService, ServiceSettings};
use route_relay::store::{PersistentStore, SqliteRouteStore, UnavailableStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::Service;

fn route(owner: &str, path: Value) -> Value {
    let points = path.as_array().unwrap();
    json!({
        "userID": owner,
        "source": points[0],
        "destination": points[points.len() - 1],
        "path": path,
        "mode": "walking",
    })
}

async fn body_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn file_store(dir: &TempDir) -> SqliteRouteStore {
    let url = format!("sqlite://{}", dir.path().join("routes.db").display());
    SqliteRouteStore::new(&url).await.unwrap()
}

#[tokio::test]
async fn test_publish_then_match_over_http() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(RouteService::new(
        Arc::new(file_store(&dir).await),
        ServiceSettings::default(),
    ));
    let mut app = create_api_server(service.clone());

    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let (tx_c, _rx_c) = mpsc::unbounded_channel();
    let a = service.connect(tx_a).await;
    let c = service.connect(tx_c).await;
    service
        .publish(&a, route("A", json!([[0, 0], [1, 1]])))
        .await
        .unwrap();
    service
        .publish(&c, route("C", json!([[0, 0], [5, 5], [1, 1]])))
        .await
        .unwrap();

    let response = app
        .call(post_json(
            "/find-matching-routes",
            json!({
                "userID": "B",
                "source": [0, 0],
                "destination": [1, 1],
                "path": [[0, 0], [1, 1]],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["backend"], "durable");
    assert_eq!(body["matches"][0]["ownerUserID"], "A");
    assert_eq!(body["matches"][0]["matchType"], "exact_path");
    assert_eq!(body["matches"][0]["matchScore"], 100);
    assert_eq!(body["matches"][0]["mode"], "walking");
    assert_eq!(body["matches"][1]["ownerUserID"], "C");
    assert_eq!(body["matches"][1]["matchType"], "same_endpoints");

    // Own routes never match
    let response = app
        .call(post_json(
            "/find-matching-routes",
            json!({"userID": "A", "path": [[0, 0], [1, 1]]}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["count"], 0);
}

#[tokio::test]
async fn test_fallback_mode_serves_from_memory() {
    let service = Arc::new(RouteService::new(
        Arc::new(UnavailableStore::new("offline")),
        ServiceSettings::default(),
    ));
    let mut app = create_api_server(service.clone());

    let (tx, _rx) = mpsc::unbounded_channel();
    let a = service.connect(tx).await;
    service
        .publish(&a, route("alice", json!([[0, 0], [1, 1]])))
        .await
        .unwrap();

    let body = body_json(app.call(get("/routes?userID=alice")).await.unwrap()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["backend"], "volatile");
    assert_eq!(body["routes"][0]["connectionID"], a.as_str());

    let body = body_json(app.call(get("/health")).await.unwrap()).await;
    assert_eq!(body["fallbackModeActive"], true);
    assert_eq!(body["activeRouteCount"], 1);
    assert!(body["storeStatus"].as_str().unwrap().starts_with("error"));
}

#[tokio::test]
async fn test_disconnect_keeps_durable_history() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(RouteService::new(
        Arc::new(file_store(&dir).await),
        ServiceSettings::default(),
    ));
    let mut app = create_api_server(service.clone());

    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let a = service.connect(tx_a).await;
    service.connect(tx_b).await;
    service
        .publish(&a, route("alice", json!([[0, 0], [1, 1]])))
        .await
        .unwrap();

    assert!(service.disconnect(&a));

    let mut events = Vec::new();
    while let Ok(frame) = rx_b.try_recv() {
        let frame: Value = serde_json::from_str(&frame).unwrap();
        events.push(frame["event"].as_str().unwrap().to_string());
    }
    assert_eq!(
        events,
        vec![
            "clientCount",
            "existing-routes",
            "route-update",
            "user-disconnected",
            "clientCount",
        ]
    );

    let body = body_json(app.call(get("/active-users")).await.unwrap()).await;
    assert_eq!(body["connectedCount"], 1);
    assert_eq!(body["activeRouteCount"], 0);

    let body = body_json(app.call(get("/routes")).await.unwrap()).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_unauthorized_clean_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(file_store(&dir).await);
    let service = Arc::new(RouteService::new(store.clone(), ServiceSettings::default()));
    let mut app = create_api_server(service.clone());

    let (tx, _rx) = mpsc::unbounded_channel();
    let a = service.connect(tx).await;
    service
        .publish(&a, route("alice", json!([[0, 0]])))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/clean-routes")
        .header("authorization", "guess")
        .body(Body::empty())
        .unwrap();
    let response = app.call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.count().await.unwrap(), 1);

    let request = Request::builder()
        .method("POST")
        .uri("/clean-routes")
        .header("authorization", "admin-secret-key")
        .body(Body::empty())
        .unwrap();
    let body = body_json(app.call(request).await.unwrap()).await;
    assert_eq!(body["originalCount"], 1);
    assert_eq!(body["newCount"], 1);
    assert_eq!(body["totalRemoved"], 0);
}

#[tokio::test]
async fn test_routes_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let service = RouteService::new(
            Arc::new(file_store(&dir).await),
            ServiceSettings::default(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = service.connect(tx).await;
        service
            .publish(&a, route("alice", json!([[0, 0], [1, 1]])))
            .await
            .unwrap();
    }

    let service = RouteService::new(
        Arc::new(file_store(&dir).await),
        ServiceSettings::default(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    service.connect(tx).await;

    let mut snapshot = None;
    while let Ok(frame) = rx.try_recv() {
        let frame: Value = serde_json::from_str(&frame).unwrap();
        if frame["event"] == "existing-routes" {
            snapshot = Some(frame);
        }
    }
    let snapshot = snapshot.unwrap();
    assert_eq!(snapshot["data"]["routes"][0]["ownerUserID"], "alice");
}

#[tokio::test]
async fn test_invalid_via_elements_are_dropped() {
    let service = RouteService::new(
        Arc::new(SqliteRouteStore::new_in_memory().await.unwrap()),
        ServiceSettings::default(),
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    let a = service.connect(tx).await;

    let mut payload = route("alice", json!([[0, 0], [1, 1]]));
    payload["via"] = json!([[1, 2], ["bad"], [3, 4]]);
    let record = service.publish(&a, payload).await.unwrap();

    let via: Vec<(f64, f64)> = record.via.iter().map(|p| (p.lat(), p.lng())).collect();
    assert_eq!(via, vec![(1.0, 2.0), (3.0, 4.0)]);

    let stored = service
        .list_routes(Some("alice".to_string()), 10, std::time::Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(stored.value.len(), 1);
    let via: Vec<(f64, f64)> = stored.value[0]
        .via
        .iter()
        .map(|p| (p.lat(), p.lng()))
        .collect();
    assert_eq!(via, vec![(1.0, 2.0), (3.0, 4.0)]);
}
