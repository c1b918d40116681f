use pretty_assertions::assert_eq;
use veil_cli::{Services, VeilConfig, default_state_path, reachability_probe};
use veil_disguise::{DecisionSource, NetworkPath, ReachabilityProbe};
use veil_storage::{KeyValueStore, keys};
use veil_types::Timestamp;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config whose catalog lives on `server` and whose disguise check goes to
/// `disguise_endpoint`.
fn config_for(server: &MockServer, disguise_endpoint: String) -> VeilConfig {
    let mut config = VeilConfig::default();
    config.client.primary_url = format!("{}/api/client", server.uri());
    config.disguise.endpoint = disguise_endpoint;
    config.disguise.timeout_secs = 1;
    config
}

/// Saves a revealed, already expired disguise verdict.
fn seed_revealed(services: &Services) {
    services.store.set_bool(keys::DISGUISE_ENABLED, false).unwrap();
    services
        .store
        .set_timestamp(keys::DISGUISE_EXPIRATION, Timestamp::from_secs(1))
        .unwrap();
}

#[test]
fn no_file_means_defaults() {
    let config = VeilConfig::load(None).unwrap();
    assert_eq!(config.client.failure_threshold, 2);
    assert_eq!(config.disguise.default_ttl_secs, 300);
    assert_eq!(config.install.scheme, "itms-services");
    assert!(config.profile.is_none());
}

#[test]
fn partial_sections_fill_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("veil.json");
    std::fs::write(
        &path,
        r#"{
            "client": {"primary_url": "http://127.0.0.1:9/api/client"},
            "profile": {"app_version": "9.9"}
        }"#,
    )
    .unwrap();

    let config = VeilConfig::load(Some(&path)).unwrap();
    assert_eq!(config.client.primary_url, "http://127.0.0.1:9/api/client");
    assert_eq!(config.client.retry.max_retries, 3);
    let profile = config.effective_profile();
    assert_eq!(profile.app_version, "9.9");
    assert_eq!(profile.locale, "unknown");
}

#[test]
fn invalid_section_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("veil.json");
    std::fs::write(&path, r#"{"install": {"origin": "not-a-url"}}"#).unwrap();

    let err = VeilConfig::load(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("install"));
}

#[test]
fn collected_profile_describes_host() {
    let profile = VeilConfig::default().effective_profile();
    assert_eq!(profile.app_version, env!("CARGO_PKG_VERSION"));
    assert!(profile.device_model.contains(std::env::consts::ARCH));
}

#[test]
fn state_path_ends_in_veil_dir() {
    let path = default_state_path();
    assert!(path.ends_with("veil/state.json"));
}

#[test]
fn services_share_one_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("nested").join("state.json");
    let services = Services::build(&VeilConfig::default(), &state, Some(NetworkPath::Wifi)).unwrap();

    let id = services.identity.resolve().unwrap();
    assert_eq!(
        services.store.get_string(keys::DEVICE_ID).unwrap().as_deref(),
        Some(id.as_str())
    );
    assert!(state.exists());

    let reopened = Services::build(&VeilConfig::default(), &state, None).unwrap();
    assert_eq!(reopened.identity.resolve().unwrap(), id);
}

#[tokio::test]
async fn offline_disguise_uses_saved_flag() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let services =
        Services::build(&VeilConfig::default(), &state, Some(NetworkPath::Unavailable)).unwrap();
    services.store.set_bool(keys::DISGUISE_ENABLED, false).unwrap();

    let decision = services.disguise.decide(false).await;
    assert_eq!(decision.source, DecisionSource::Offline);
    assert!(decision.reveal_real_app);
}

#[test]
fn link_resolution_uses_configured_origin() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = VeilConfig::default();
    config.install.origin = "https://mirror.example.com".into();
    let services = Services::build(&config, &dir.path().join("s.json"), None).unwrap();

    let (manifest, trigger) = services.installer.trigger_for("/api/plist/aa/bb");
    assert_eq!(manifest.url, "https://mirror.example.com/api/plist/aa/bb");
    assert!(trigger.starts_with("itms-services://?action=download-manifest&url=https%3A%2F%2Fmirror"));
}

#[tokio::test]
async fn default_probe_checks_catalog_host() {
    let server = MockServer::start().await;
    let mut config = VeilConfig::default();
    config.client.primary_url = format!("{}/api/client", server.uri());
    config.disguise.endpoint = "http://127.0.0.1:9/disguise_check.php".into();

    assert_eq!(reachability_probe(&config, None).classify().await, NetworkPath::Wifi);
    assert_eq!(
        reachability_probe(&config, Some(NetworkPath::Cellular)).classify().await,
        NetworkPath::Cellular
    );
}

#[tokio::test]
async fn default_wiring_keeps_decoy_when_refused() {
    for status in [401, 403] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disguise_check.php"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, format!("{}/disguise_check.php", server.uri()));
        let services = Services::build(&config, &dir.path().join("s.json"), None).unwrap();
        seed_revealed(&services);

        let decision = services.disguise.decide(false).await;
        assert_eq!(decision.source, DecisionSource::FailSafe, "status {status}");
        assert!(!decision.reveal_real_app);
        assert_eq!(services.store.get_bool(keys::DISGUISE_ENABLED).unwrap(), Some(true));
    }
}

#[tokio::test]
async fn default_wiring_keeps_decoy_when_disguise_host_is_down() {
    let server = MockServer::start().await;
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, format!("http://{dead_addr}/disguise_check.php"));
    let services = Services::build(&config, &dir.path().join("s.json"), None).unwrap();
    seed_revealed(&services);

    let decision = services.disguise.decide(false).await;
    assert_eq!(decision.source, DecisionSource::FailSafe);
    assert!(!decision.reveal_real_app);
}
