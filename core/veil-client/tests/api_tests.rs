use pretty_assertions::assert_eq;
use serde_json::json;
use veil_client::{ApiClient, ClientConfig, ClientError, RetryPolicy, Timeouts};
use veil_crypto::EnvelopeCodec;
use veil_types::{AppId, DeviceId};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        primary_url: format!("{}/api/client", server.uri()),
        fallback_urls: Vec::new(),
        retry: RetryPolicy {
            max_retries: 3,
            delay_ms: 10,
        },
        ..Default::default()
    }
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(mock_config(server)).unwrap()
}

fn app_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("App {id}"),
        "version": "1.0",
        "icon": "https://cdn.test/icon.png",
        "plist": "/api/plist/aa/bb",
        "requires_key": 1
    })
}

fn udid() -> DeviceId {
    DeviceId::new("DEVICE-0001").unwrap()
}

fn app(id: &str) -> AppId {
    AppId::new(id).unwrap()
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn config_defaults() {
    let cfg = ClientConfig::default();
    assert_eq!(cfg.primary_url, "https://renmai.cloudmantoub.online/api/client");
    assert_eq!(cfg.failure_threshold, 2);
    assert_eq!(cfg.retry.max_retries, 3);
    assert_eq!(cfg.retry.delay_ms, 1_000);
    assert_eq!(cfg.timeouts, Timeouts { ping_secs: 5, api_secs: 15, lookup_secs: 10 });
}

#[test]
fn config_partial_json_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.json");
    std::fs::write(&path, r#"{"primary_url": "http://localhost:9/api/client"}"#).unwrap();
    let cfg = ClientConfig::from_json_file(&path).unwrap();
    assert_eq!(cfg.primary_url, "http://localhost:9/api/client");
    assert_eq!(cfg.failure_threshold, 2);
}

#[test]
fn config_missing_file_is_config_error() {
    assert!(matches!(
        ClientConfig::from_json_file("/nonexistent/veil.json"),
        Err(ClientError::Config(_))
    ));
}

#[test]
fn config_rejects_non_http_endpoint() {
    let cfg = ClientConfig {
        fallback_urls: vec!["ftp://nope".into()],
        ..Default::default()
    };
    assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
    assert!(ApiClient::new(cfg).is_err());
}

// ── ping / probe ────────────────────────────────────────────────

#[tokio::test]
async fn ping_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/client/ping"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;
    client(&server).ping().await.unwrap();
}

#[tokio::test]
async fn probe_rotates_on_failure() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(path("/api/client/ping"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&primary)
        .await;

    let cfg = ClientConfig {
        fallback_urls: vec![format!("{}/api/client", fallback.uri())],
        ..mock_config(&primary)
    };
    let api = ApiClient::new(cfg).unwrap();
    assert!(!api.probe_primary().await);
    assert_eq!(api.router().index(), 1);
}

#[tokio::test]
async fn probe_does_not_rotate_twice() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(path("/api/client/ping"))
        .respond_with(
            ResponseTemplate::new(503).set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&primary)
        .await;

    let cfg = ClientConfig {
        fallback_urls: vec![
            format!("{}/api/client", fallback.uri()),
            format!("{}/api/client", fallback.uri()),
        ],
        ..mock_config(&primary)
    };
    let api = ApiClient::new(cfg).unwrap();
    let rotate_meanwhile = async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        api.router().rotate();
    };
    let (healthy, ()) = tokio::join!(api.probe_primary(), rotate_meanwhile);

    assert!(!healthy);
    assert_eq!(api.router().index(), 1);
}

#[tokio::test]
async fn ping_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/ping"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&server)
        .await;
    let cfg = ClientConfig {
        timeouts: Timeouts { ping_secs: 1, ..Default::default() },
        ..mock_config(&server)
    };
    let err = ApiClient::new(cfg).unwrap().ping().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "got {err:?}");
}

// ── list_apps ───────────────────────────────────────────────────

#[tokio::test]
async fn list_apps_plain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [app_json("1"), app_json("2"), {"id": "3"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let apps = client(&server).list_apps().await.unwrap();
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0].id.as_str(), "1");
    assert!(apps[1].requires_key);
}

#[tokio::test]
async fn list_apps_enveloped() {
    let server = MockServer::start().await;
    let envelope = EnvelopeCodec::embedded()
        .seal_json(&json!([app_json("7")]))
        .unwrap();
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": envelope.to_value()
        })))
        .mount(&server)
        .await;

    let apps = client(&server).list_apps().await.unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].name, "App 7");
}

#[tokio::test]
async fn list_apps_tolerates_leading_noise() {
    let server = MockServer::start().await;
    let body = format!("Warning: cache miss\n{}", json!({"data": [app_json("1")]}));
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    assert_eq!(client(&server).list_apps().await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_apps_rejected() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "message": "maintenance"
        })))
        .mount(&server)
        .await;
    let api = client(&server);
    let err = api.list_apps().await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(ref m) if m == "maintenance"));
    assert_eq!(api.router().failure_count(), 1);
}

// ── Retry & rotation ────────────────────────────────────────────

#[tokio::test]
async fn retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [app_json("1")]})))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(api.list_apps().await.unwrap().len(), 1);
    assert_eq!(api.router().failure_count(), 0);
}

#[tokio::test]
async fn exhausted_retries_surface_one_error() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let api = client(&server);
    let err = api.list_apps().await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert!(err.is_protocol());
    assert_eq!(api.router().failure_count(), 1);
}

#[tokio::test]
async fn sustained_failure_rotates_to_fallback() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&primary)
        .await;
    Mock::given(path("/api/client/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [app_json("1")]})))
        .expect(1)
        .mount(&fallback)
        .await;

    let cfg = ClientConfig {
        fallback_urls: vec![format!("{}/api/client", fallback.uri())],
        retry: RetryPolicy::none(),
        ..mock_config(&primary)
    };
    let api = ApiClient::new(cfg).unwrap();
    assert!(api.list_apps().await.is_err());
    assert_eq!(api.router().index(), 0);
    assert!(api.list_apps().await.is_err());
    assert_eq!(api.router().index(), 1);
    assert_eq!(api.list_apps().await.unwrap().len(), 1);
}

// ── app_detail ──────────────────────────────────────────────────

#[tokio::test]
async fn app_detail_sends_udid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/client/apps/42"))
        .and(query_param("udid", "DEVICE-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "data": app_json("42")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let detail = client(&server).app_detail(&app("42"), &udid()).await.unwrap();
    assert_eq!(detail.plist.as_deref(), Some("/api/plist/aa/bb"));
}

#[tokio::test]
async fn app_detail_single_object_body() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/apps/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_json("5")))
        .mount(&server)
        .await;
    let detail = client(&server).app_detail(&app("5"), &udid()).await.unwrap();
    assert_eq!(detail.id, app("5"));
}

#[tokio::test]
async fn app_detail_missing_fields_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/apps/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "5"}})))
        .mount(&server)
        .await;
    let err = client(&server).app_detail(&app("5"), &udid()).await.unwrap_err();
    assert!(matches!(err, ClientError::Malformed(_)));
}

// ── verify_card ─────────────────────────────────────────────────

#[tokio::test]
async fn verify_posts_credentials_and_prefers_plist() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/client/verify"))
        .and(body_json(json!({"cardKey": "CARD-1", "appId": "42", "udid": "DEVICE-0001"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "unlocked",
            "plist": "https://dl.test/api/plist/aa/bb"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server)
        .verify_card("CARD-1", &app("42"), &udid())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.payload(), Some("https://dl.test/api/plist/aa/bb"));
}

#[tokio::test]
async fn verify_opens_envelope_when_message_missing() {
    let server = MockServer::start().await;
    let envelope = EnvelopeCodec::embedded()
        .seal_json(&json!({"success": true, "message": "all apps unlocked", "plist": "/api/plist/01/02"}))
        .unwrap();
    Mock::given(path("/api/client/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "data": envelope.to_value()
        })))
        .mount(&server)
        .await;

    let outcome = client(&server).verify_card("K", &app("1"), &udid()).await.unwrap();
    assert_eq!(outcome.message.as_deref(), Some("all apps unlocked"));
    assert_eq!(outcome.manifest_link(), Some("/api/plist/01/02"));
}

#[tokio::test]
async fn verify_default_message() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    let outcome = client(&server).verify_card("K", &app("1"), &udid()).await.unwrap();
    assert_eq!(outcome.message.as_deref(), Some("card key verified"));
}

#[tokio::test]
async fn verify_refusal_is_not_an_endpoint_failure() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "message": "card already used"
        })))
        .mount(&server)
        .await;
    let api = client(&server);
    let outcome = api.verify_card("K", &app("1"), &udid()).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.payload(), Some("card already used"));
    assert_eq!(api.router().failure_count(), 0);
}

// ── refresh_app ─────────────────────────────────────────────────

#[tokio::test]
async fn refresh_success_heuristics() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/client/refresh-app/1"))
        .and(query_param("udid", "DEVICE-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
        .mount(&server)
        .await;
    Mock::given(path("/api/client/refresh-app/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .mount(&server)
        .await;
    Mock::given(path("/api/client/refresh-app/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&server)
        .await;

    let api = client(&server);
    assert!(api.refresh_app(&app("1"), &udid()).await.unwrap());
    assert!(api.refresh_app(&app("2"), &udid()).await.unwrap());
    assert!(!api.refresh_app(&app("3"), &udid()).await.unwrap());
}

// ── check_udid ──────────────────────────────────────────────────

#[tokio::test]
async fn check_udid_wildcard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/client/check-udid"))
        .and(query_param("udid", "DEVICE-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"bound": true, "bindings": [{"app_id": null}]}
        })))
        .mount(&server)
        .await;

    let status = client(&server).check_udid(&udid()).await.unwrap();
    assert!(status.has_wildcard());
    assert!(status.grants(&app("anything")));
}

#[tokio::test]
async fn check_udid_bound_without_bindings_is_unbound() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/check-udid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "data": {"bound": true, "bindings": []}
        })))
        .mount(&server)
        .await;
    let status = client(&server).check_udid(&udid()).await.unwrap();
    assert!(!status.bound);
}

#[tokio::test]
async fn check_udid_malformed_binding_unlocks_nothing() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/check-udid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "data": {"bound": true, "bindings": [{"app_id": false}]}
        })))
        .mount(&server)
        .await;
    let status = client(&server).check_udid(&udid()).await.unwrap();
    assert!(!status.has_wildcard());
    assert!(!status.grants(&app("Y")));
}

#[tokio::test]
async fn check_udid_unsuccessful_is_unbound() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/check-udid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&server)
        .await;
    assert!(!client(&server).check_udid(&udid()).await.unwrap().bound);
}

#[tokio::test]
async fn check_udid_is_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(path("/api/client/check-udid"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let api = client(&server);
    let err = api.check_udid(&udid()).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(api.router().failure_count(), 0);
}
