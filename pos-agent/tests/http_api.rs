//! HTTP routes, driven through the router without a socket

mod common;

use axum::Router;
use axum::body::Body;
use common::{Probe, hardware_config, simulate_config};
use http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use pos_agent::api::build_app;
use pos_agent::{AgentConfig, LogBuffer, ServerState};
use serde_json::{Value, json};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: ServerState,
    probe: Probe,
    _dir: tempfile::TempDir,
}

impl TestApp {
    fn new(config: AgentConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let probe = Probe::default();
        let state = ServerState::with_factory(
            config,
            dir.path().to_path_buf(),
            LogBuffer::default(),
            probe.factory(),
        );
        Self {
            app: build_app(state.clone()),
            state,
            probe,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

#[tokio::test]
async fn test_print_and_last_job() {
    let app = TestApp::new(hardware_config());

    let (status, body) = app.get("/api/last-job").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "commands": null}));

    let job = json!([{"type": "text", "value": "Hola"}, {"type": "cut"}]);
    let (status, body) = app.post("/print", job).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "msg": "Trabajo de impresión procesado"})
    );

    let (_, body) = app.get("/api/last-job").await;
    assert_eq!(body["commands"][0]["type"], "text");
    assert_eq!(body["commands"][0]["value"], "Hola");
    assert_eq!(body["commands"][1], json!({"type": "cut"}));
}

#[tokio::test]
async fn test_legacy_print_route() {
    let app = TestApp::new(hardware_config());

    let (status, _) = app
        .post("/imprimir", json!({"commands": [{"type": "beep"}]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.probe.calls().contains(&"beep".to_string()));
}

#[tokio::test]
async fn test_print_failure_is_reported() {
    let app = TestApp::new(hardware_config());
    app.probe.fail_next.store(true, Ordering::SeqCst);

    let (status, body) = app.post("/print", json!([{"type": "text", "value": "x"}])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["msg"].as_str().unwrap().starts_with("Printer Error:"));
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let app = TestApp::new(hardware_config());

    let request = Request::post("/print")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(app.probe.calls().is_empty());
}

#[tokio::test]
async fn test_open_drawer() {
    let app = TestApp::new(hardware_config());

    let (status, body) = app.get("/printer/open").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "msg": "Cash register opened successfully"})
    );

    let (status, _) = app.post("/printer/open", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.probe.sent().len(), 2);
}

#[tokio::test]
async fn test_config_roundtrip() {
    let app = TestApp::new(simulate_config());

    let (status, body) = app.get("/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["port"], 3000);
    assert_eq!(body["printer"]["type"], "epson");
    assert_eq!(body["printer"]["characterSet"], "PC852_LATIN2");

    let (status, body) = app
        .post(
            "/api/config",
            json!({"port": 4000, "printer": {"width": 42}, "kiosk": "front"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = app.get("/api/config").await;
    assert_eq!(body["port"], 4000);
    assert_eq!(body["printer"]["width"], 42);
    assert_eq!(body["printer"]["interface"], "tcp://192.168.1.50:9100");
    assert_eq!(body["kiosk"], "front");

    let saved = std::fs::read_to_string(app.state.work_dir().join("config.json")).unwrap();
    let saved: Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved["port"], 4000);
    assert_eq!(saved["printer"]["width"], 42);
}

#[tokio::test]
async fn test_config_rejects_bad_values() {
    let app = TestApp::new(simulate_config());

    let (status, _) = app.post("/api/config", json!(["not", "an", "object"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/config", json!({"port": "eighty"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/config").await;
    assert_eq!(body["port"], 3000);
    assert!(!app.state.work_dir().join("config.json").exists());
}

#[tokio::test]
async fn test_logs_and_health() {
    let app = TestApp::new(simulate_config());
    app.state.logs.push("[2026-01-01T00:00:00.000Z] [INFO] hello".into());

    let (status, body) = app.get("/api/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["[2026-01-01T00:00:00.000Z] [INFO] hello"]));

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["test_mode"], true);
    assert_eq!(body["queued"], 0);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_origins() {
    let mut config = hardware_config();
    config.allowed_origins = vec!["https://shop.example.com".into()];
    let app = TestApp::new(config);

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/print")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    for origin in ["http://localhost:5173", "https://shop.example.com"] {
        let response = app.app.clone().oneshot(preflight(origin)).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            origin
        );
    }

    let response = app
        .app
        .clone()
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_stop_cancels_shutdown_token() {
    let app = TestApp::new(simulate_config());

    let (status, body) = app.post("/api/service/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(!app.state.shutdown.is_cancelled());

    tokio::time::timeout(Duration::from_secs(3), app.state.shutdown.cancelled())
        .await
        .unwrap();
}
