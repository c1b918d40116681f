//! Configuration and service wiring for the `veil` binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use veil_client::{ApiClient, ClientConfig};
use veil_crypto::EnvelopeCodec;
use veil_disguise::{
    DeviceProfile, DisguiseConfig, DisguiseEngine, NetworkPath, ReachabilityProbe,
    StaticReachability, TcpReachability,
};
use veil_install::{InstallConfig, Installer, LinkResolver, SystemOpener, UrlOpener};
use veil_license::{DeviceIdentity, DeviceInfo, EntitlementResolver, MachineIdentifier};
use veil_storage::{JsonFileStore, KeyValueStore};

/// Everything the binary can be configured with, as one JSON document.
///
/// ```json
/// {
///   "client":   { "primary_url": "https://renmai.cloudmantoub.online/api/client" },
///   "disguise": { "timeout_secs": 10 },
///   "install":  { "origin": "https://renmai.cloudmantoub.online" },
///   "profile":  { "app_version": "1.0" }
/// }
/// ```
///
/// Every section and field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    pub client: ClientConfig,
    pub disguise: DisguiseConfig,
    pub install: InstallConfig,
    /// Overrides the profile collected from the host.
    pub profile: Option<DeviceProfile>,
}

impl VeilConfig {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.client.validate().context("Invalid client section")?;
        self.disguise.validate().context("Invalid disguise section")?;
        self.install.validate().context("Invalid install section")?;
        Ok(())
    }

    /// The configured profile, or one collected from this host.
    pub fn effective_profile(&self) -> DeviceProfile {
        if let Some(profile) = &self.profile {
            return profile.clone();
        }
        let info = DeviceInfo::collect();
        DeviceProfile {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            build_number: env!("CARGO_PKG_VERSION").to_string(),
            device_model: info.model(),
            os_version: info.os_version,
            ..DeviceProfile::from_env()
        }
    }
}

/// Default location of the persisted client state.
pub fn default_state_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("veil")
        .join("state.json")
}

/// Probe used by the disguise engine.
///
/// Connectivity is tested against the catalog host, never the disguise host,
/// so an unreachable disguise server goes through the check and keeps the
/// decoy. A connected host is treated as Wi-Fi.
pub fn reachability_probe(
    config: &VeilConfig,
    network: Option<NetworkPath>,
) -> Arc<dyn ReachabilityProbe> {
    if let Some(path) = network {
        return Arc::new(StaticReachability(path));
    }
    let timeout = Duration::from_secs(config.disguise.timeout_secs);
    match TcpReachability::for_url(&config.client.primary_url, timeout) {
        Some(probe) => Arc::new(probe.reporting(NetworkPath::Wifi)),
        None => Arc::new(StaticReachability(NetworkPath::Wifi)),
    }
}

/// The client services, wired to one state file.
pub struct Services {
    pub store: Arc<JsonFileStore>,
    pub identity: Arc<DeviceIdentity>,
    pub api: Arc<ApiClient>,
    pub entitlements: EntitlementResolver,
    pub disguise: DisguiseEngine,
    pub installer: Installer,
    pub codec: EnvelopeCodec,
}

impl Services {
    /// Builds every service. `network` pins the reachability classification;
    /// `None` uses [`reachability_probe`].
    pub fn build(
        config: &VeilConfig,
        state_path: &Path,
        network: Option<NetworkPath>,
    ) -> Result<Self> {
        Self::build_with_opener(config, state_path, network, Arc::new(SystemOpener))
    }

    pub fn build_with_opener(
        config: &VeilConfig,
        state_path: &Path,
        network: Option<NetworkPath>,
        opener: Arc<dyn UrlOpener>,
    ) -> Result<Self> {
        let store = Arc::new(
            JsonFileStore::open(state_path)
                .with_context(|| format!("Failed to open state {}", state_path.display()))?,
        );
        let shared: Arc<dyn KeyValueStore> = store.clone();
        let codec = EnvelopeCodec::embedded();

        let identity = Arc::new(DeviceIdentity::new(shared.clone(), Arc::new(MachineIdentifier)));
        let api = Arc::new(
            ApiClient::with_codec(config.client.clone(), codec.clone())
                .context("Failed to create API client")?,
        );
        let entitlements = EntitlementResolver::new(api.clone(), shared.clone(), identity.clone());

        let probe = reachability_probe(config, network);
        let disguise = DisguiseEngine::new(
            config.disguise.clone(),
            shared.clone(),
            identity.clone(),
            probe,
        )
        .context("Failed to create disguise engine")?
        .with_profile(config.effective_profile())
        .with_codec(codec.clone());

        let installer = Installer::new(
            LinkResolver::new(config.install.clone(), codec.clone()),
            opener,
            shared,
        );

        Ok(Self {
            store,
            identity,
            api,
            entitlements,
            disguise,
            installer,
            codec,
        })
    }
}
