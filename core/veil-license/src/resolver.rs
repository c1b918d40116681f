//! Entitlement resolution.

use crate::authority::EntitlementAuthority;
use crate::error::{EntitlementError, EntitlementResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use veil_storage::{KeyValueStore, keys};
use veil_types::{AppId, DeviceId, IdentityProvider};

/// Where an application stands on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitlementState {
    /// Nothing has been asked yet.
    Unknown,
    /// A binding lookup is in flight.
    Checking,
    /// The application may be installed.
    Unlocked,
    /// A card key must be redeemed first.
    NeedsCard,
}

/// Local and server views of one application's unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub app_id: AppId,
    pub requires_key: bool,
    pub is_unlocked_locally: bool,
    /// `None` if the server could not be asked.
    pub is_unlocked_server_truth: Option<bool>,
}

impl EntitlementRecord {
    /// Returns true if the application can be installed without a card key.
    /// Server truth wins when known.
    #[must_use]
    pub fn is_installable(&self) -> bool {
        !self.requires_key
            || self
                .is_unlocked_server_truth
                .unwrap_or(self.is_unlocked_locally)
    }
}

/// A successful card-key redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Server message.
    pub message: String,
    /// Manifest link to install from, when the server returned one.
    pub manifest_link: Option<String>,
}

impl VerifyResult {
    /// The link if present, otherwise the message.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.manifest_link.as_deref().unwrap_or(&self.message)
    }
}

/// Resolves per-app entitlements against the server, caching unlocks
/// locally.
pub struct EntitlementResolver {
    authority: Arc<dyn EntitlementAuthority>,
    store: Arc<dyn KeyValueStore>,
    identity: Arc<dyn IdentityProvider>,
    states: Mutex<HashMap<AppId, EntitlementState>>,
}

impl EntitlementResolver {
    pub fn new(
        authority: Arc<dyn EntitlementAuthority>,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            authority,
            store,
            identity,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of `app_id`.
    pub fn state(&self, app_id: &AppId) -> EntitlementState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(app_id)
            .copied()
            .unwrap_or(EntitlementState::Unknown)
    }

    fn set_state(&self, app_id: &AppId, state: EntitlementState) {
        debug!(app = %app_id, ?state, "entitlement state");
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(app_id.clone(), state);
    }

    /// Returns true if `app_id` is flagged unlocked in local storage.
    pub fn is_unlocked_locally(&self, app_id: &AppId) -> bool {
        match self.store.get_bool(&keys::app_unlocked(app_id.as_str())) {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(app = %app_id, error = %e, "unreadable unlock flag");
                false
            }
        }
    }

    fn mark_unlocked(&self, app_id: &AppId) -> EntitlementResult<()> {
        self.store
            .set_bool(&keys::app_unlocked(app_id.as_str()), true)?;
        Ok(())
    }

    /// Decides whether installing `app_id` needs a card key.
    ///
    /// Free applications never do. Otherwise the server's binding list for
    /// this device is consulted: a wildcard grant or a grant for `app_id`
    /// means no, and the unlock is written through to local storage. Any
    /// lookup failure means yes.
    pub async fn requires_verification(&self, app_id: &AppId, requires_key: bool) -> bool {
        if !requires_key {
            self.set_state(app_id, EntitlementState::Unlocked);
            return false;
        }

        self.set_state(app_id, EntitlementState::Checking);
        let udid = self.identity.device_id();
        match self.authority.binding_status(&udid).await {
            Ok(status) if status.grants(app_id) => {
                if let Err(e) = self.mark_unlocked(app_id) {
                    warn!(app = %app_id, error = %e, "could not cache unlock");
                }
                info!(app = %app_id, wildcard = status.has_wildcard(), "device already entitled");
                self.set_state(app_id, EntitlementState::Unlocked);
                false
            }
            Ok(_) => {
                self.set_state(app_id, EntitlementState::NeedsCard);
                true
            }
            Err(e) => {
                warn!(app = %app_id, error = %e, "binding lookup failed, asking for card key");
                self.set_state(app_id, EntitlementState::NeedsCard);
                true
            }
        }
    }

    /// Redeems `card_key` for `app_id` on `device_id`, caching the unlock on
    /// success.
    ///
    /// # Errors
    ///
    /// [`EntitlementError::Rejected`] if the server refuses the key; client
    /// or storage errors otherwise.
    pub async fn verify_card(
        &self,
        card_key: &str,
        app_id: &AppId,
        device_id: &DeviceId,
    ) -> EntitlementResult<VerifyResult> {
        let card_key = card_key.trim();
        if card_key.is_empty() {
            return Err(EntitlementError::Rejected("card key is empty".into()));
        }

        let outcome = self.authority.redeem(card_key, app_id, device_id).await?;
        if !outcome.success {
            self.set_state(app_id, EntitlementState::NeedsCard);
            let message = outcome
                .message
                .unwrap_or_else(|| "verification failed".to_string());
            info!(app = %app_id, %message, "card key rejected");
            return Err(EntitlementError::Rejected(message));
        }

        self.mark_unlocked(app_id)?;
        self.set_state(app_id, EntitlementState::Unlocked);

        let manifest_link = outcome.manifest_link().map(String::from);
        let message = outcome.message.unwrap_or_default();
        info!(app = %app_id, has_link = manifest_link.is_some(), "card key accepted");
        Ok(VerifyResult {
            message,
            manifest_link,
        })
    }

    /// [`verify_card`](Self::verify_card) for this device.
    pub async fn redeem(&self, card_key: &str, app_id: &AppId) -> EntitlementResult<VerifyResult> {
        let udid = self.identity.device_id();
        self.verify_card(card_key, app_id, &udid).await
    }

    /// Asks the server to refresh `app_id`. Never fails: errors are logged
    /// and reported as `false`.
    pub async fn refresh_entitlement(&self, app_id: &AppId) -> bool {
        let udid = self.identity.device_id();
        match self.authority.refresh(app_id, &udid).await {
            Ok(refreshed) => {
                debug!(app = %app_id, refreshed, "entitlement refresh");
                refreshed
            }
            Err(e) => {
                warn!(app = %app_id, error = %e, "entitlement refresh failed");
                false
            }
        }
    }

    /// Builds the combined local/server view of `app_id`.
    pub async fn resolve_record(&self, app_id: &AppId, requires_key: bool) -> EntitlementRecord {
        let server_truth = if requires_key {
            let udid = self.identity.device_id();
            match self.authority.binding_status(&udid).await {
                Ok(status) => Some(status.grants(app_id)),
                Err(e) => {
                    warn!(app = %app_id, error = %e, "binding lookup failed");
                    None
                }
            }
        } else {
            Some(true)
        };

        if requires_key && server_truth == Some(true) {
            if let Err(e) = self.mark_unlocked(app_id) {
                warn!(app = %app_id, error = %e, "could not cache unlock");
            }
        }

        EntitlementRecord {
            app_id: app_id.clone(),
            requires_key,
            is_unlocked_locally: self.is_unlocked_locally(app_id),
            is_unlocked_server_truth: server_truth,
        }
    }
}
