//! The disguise decision engine.

use crate::config::DisguiseConfig;
use crate::error::{DisguiseError, DisguiseResult};
use crate::network::{NetworkPath, ReachabilityProbe};
use crate::profile::{DeviceProfile, LocationProvider, NoLocation, advanced_request, basic_request};
use crate::state::DisguiseState;
use crate::verdict::Verdict;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use veil_client::{ClientError, parse_body};
use veil_crypto::EnvelopeCodec;
use veil_storage::KeyValueStore;
use veil_types::{Clock, IdentityProvider, SystemClock, Timestamp};

/// Which request variant to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// `{udid, app_version}`.
    Basic,
    /// Full device profile, location and timestamp.
    Advanced,
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// A cached verdict that had not expired.
    Cache,
    /// No network path; the cached flag was used.
    Offline,
    /// A fresh server verdict.
    Server,
    /// The server was unreachable or refused the device; decoy kept.
    FailSafe,
    /// The check failed some other way; the cached flag was used.
    Fallback,
}

/// The answer to "may the real application be shown?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisguiseDecision {
    pub reveal_real_app: bool,
    pub source: DecisionSource,
}

impl DisguiseDecision {
    fn from_flag(disguise_enabled: bool, source: DecisionSource) -> Self {
        Self {
            reveal_real_app: !disguise_enabled,
            source,
        }
    }
}

/// Decides whether the decoy stays in front.
///
/// Every network check takes a generation number when it starts. When it
/// finishes, its result is persisted only if no newer check has started in
/// the meantime; the caller still gets the result either way.
pub struct DisguiseEngine {
    config: DisguiseConfig,
    http: Client,
    store: Arc<dyn KeyValueStore>,
    identity: Arc<dyn IdentityProvider>,
    probe: Arc<dyn ReachabilityProbe>,
    clock: Arc<dyn Clock>,
    location: Arc<dyn LocationProvider>,
    profile: DeviceProfile,
    codec: EnvelopeCodec,
    generation: AtomicU64,
    commit: Mutex<()>,
    updates: watch::Sender<bool>,
}

impl DisguiseEngine {
    /// Creates an engine using the system clock, no location and the
    /// embedded envelope key.
    pub fn new(
        config: DisguiseConfig,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn IdentityProvider>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> DisguiseResult<Self> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DisguiseError::Config(format!("failed to create HTTP client: {e}")))?;
        let initial = DisguiseState::load(store.as_ref())
            .map(|state| state.enabled)
            .unwrap_or(true);
        let (updates, _) = watch::channel(initial);

        Ok(Self {
            config,
            http,
            store,
            identity,
            probe,
            clock: Arc::new(SystemClock),
            location: Arc::new(NoLocation),
            profile: DeviceProfile::default(),
            codec: EnvelopeCodec::embedded(),
            generation: AtomicU64::new(0),
            commit: Mutex::new(()),
            updates,
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: EnvelopeCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &DisguiseConfig {
        &self.config
    }

    /// Reads the persisted state.
    pub fn cached_state(&self) -> DisguiseResult<DisguiseState> {
        Ok(DisguiseState::load(self.store.as_ref())?)
    }

    /// Receives the disguise flag (`true` = decoy) whenever it changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.updates.subscribe()
    }

    /// Shorthand for `decide(force).reveal_real_app`.
    pub async fn should_reveal_real_app(&self, force: bool) -> bool {
        self.decide(force).await.reveal_real_app
    }

    /// Publishes the saved flag, then runs a normal decision.
    pub async fn startup_check(&self) -> DisguiseDecision {
        match self.cached_state() {
            Ok(state) => self.publish(state.enabled),
            Err(e) => warn!(error = %e, "unreadable disguise state at startup"),
        }
        let decision = self.decide(false).await;
        info!(
            reveal = decision.reveal_real_app,
            source = ?decision.source,
            "startup disguise check"
        );
        decision
    }

    /// Decides whether the real application may be shown.
    ///
    /// Never fails: every error path resolves to the cached flag or to
    /// keeping the decoy. With `force` the cache expiry is ignored.
    pub async fn decide(&self, force: bool) -> DisguiseDecision {
        let now = self.clock.now();
        let cached = self.cached_state().unwrap_or_else(|e| {
            warn!(error = %e, "unreadable disguise state, assuming decoy");
            DisguiseState::default()
        });

        if !force && cached.is_fresh(now) {
            debug!(expires_at = ?cached.expires_at, "using cached disguise verdict");
            return DisguiseDecision::from_flag(cached.enabled, DecisionSource::Cache);
        }

        let path = self.probe.classify().await;
        if path == NetworkPath::Unavailable {
            debug!("no network path, using cached disguise flag");
            return DisguiseDecision::from_flag(cached.enabled, DecisionSource::Offline);
        }

        let kind = if path.is_mobile_or_wifi() {
            CheckKind::Advanced
        } else {
            CheckKind::Basic
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(?path, ?kind, generation, "starting disguise check");

        match self.check(kind, now).await {
            Ok(verdict) => {
                let expires_at = verdict
                    .expires_at
                    .unwrap_or_else(|| now.saturating_add(self.config.default_ttl()));
                self.commit(
                    generation,
                    DisguiseState {
                        enabled: verdict.disguise_enabled,
                        last_checked_at: Some(now),
                        expires_at: Some(expires_at),
                    },
                );
                DisguiseDecision::from_flag(verdict.disguise_enabled, DecisionSource::Server)
            }
            Err(e) if e.is_unreachable() || e.is_refused() => {
                warn!(error = %e, ?kind, "disguise server unavailable, keeping decoy");
                self.commit(
                    generation,
                    DisguiseState {
                        enabled: true,
                        last_checked_at: Some(now),
                        expires_at: None,
                    },
                );
                DisguiseDecision::from_flag(true, DecisionSource::FailSafe)
            }
            Err(e) => {
                warn!(error = %e, ?kind, "disguise check failed, using cached flag");
                if kind == CheckKind::Advanced {
                    self.commit(
                        generation,
                        DisguiseState {
                            last_checked_at: Some(now),
                            ..cached
                        },
                    );
                }
                DisguiseDecision::from_flag(cached.enabled, DecisionSource::Fallback)
            }
        }
    }

    /// Sends one check to the server and returns its verdict. Nothing is
    /// persisted.
    pub async fn check(&self, kind: CheckKind, now: Timestamp) -> DisguiseResult<Verdict> {
        let udid = self.identity.device_id();
        let body = match kind {
            CheckKind::Basic => basic_request(&udid, &self.profile),
            CheckKind::Advanced => {
                let fix = self.location.current();
                advanced_request(&udid, &self.profile, fix.as_ref(), now)
            }
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .timeout(self.config.timeout())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Status(status.as_u16()).into());
        }
        let raw = response.bytes().await.map_err(ClientError::from)?;
        let parsed = parse_body(&raw)?;
        Verdict::from_body(&parsed, &self.codec)
    }

    /// Persists `state` unless a newer check has started since `generation`.
    fn commit(&self, generation: u64, state: DisguiseState) {
        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
        let latest = self.generation.load(Ordering::SeqCst);
        if generation != latest {
            debug!(generation, latest, "discarding result of superseded disguise check");
            return;
        }
        if let Err(e) = state.save(self.store.as_ref()) {
            warn!(error = %e, "failed to persist disguise state");
        }
        self.publish(state.enabled);
    }

    fn publish(&self, enabled: bool) {
        self.updates.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
    }
}
