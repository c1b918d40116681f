//! Persisted disguise state.

use veil_storage::{KeyValueStore, StorageResult, keys};
use veil_types::Timestamp;

/// The cached disguise verdict.
///
/// A missing flag means "keep the decoy".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisguiseState {
    /// True while the decoy must stay in front.
    pub enabled: bool,
    pub last_checked_at: Option<Timestamp>,
    /// Until when `enabled` may be used without asking the server.
    pub expires_at: Option<Timestamp>,
}

impl Default for DisguiseState {
    fn default() -> Self {
        Self {
            enabled: true,
            last_checked_at: None,
            expires_at: None,
        }
    }
}

impl DisguiseState {
    /// Loads the state from `store`, defaulting missing entries.
    pub fn load(store: &dyn KeyValueStore) -> StorageResult<Self> {
        Ok(Self {
            enabled: store.get_bool(keys::DISGUISE_ENABLED)?.unwrap_or(true),
            last_checked_at: store.get_timestamp(keys::LAST_DISGUISE_CHECK)?,
            expires_at: store.get_timestamp(keys::DISGUISE_EXPIRATION)?,
        })
    }

    /// Writes every field. A `None` field removes its key.
    pub fn save(&self, store: &dyn KeyValueStore) -> StorageResult<()> {
        store.set_bool(keys::DISGUISE_ENABLED, self.enabled)?;
        match self.last_checked_at {
            Some(at) => store.set_timestamp(keys::LAST_DISGUISE_CHECK, at)?,
            None => store.remove(keys::LAST_DISGUISE_CHECK)?,
        }
        match self.expires_at {
            Some(at) => store.set_timestamp(keys::DISGUISE_EXPIRATION, at)?,
            None => store.remove(keys::DISGUISE_EXPIRATION)?,
        }
        Ok(())
    }

    /// Returns true if the verdict is still valid at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| expiry > now)
    }

    /// Whether the real application may be shown.
    #[must_use]
    pub fn reveal_real_app(&self) -> bool {
        !self.enabled
    }
}
