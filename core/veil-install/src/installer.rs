//! Install planning and triggering.

use crate::error::{InstallError, InstallResult};
use crate::locator::{LinkResolver, ResolvedLink};
use crate::opener::UrlOpener;
use crate::trigger::{install_trigger, sanitize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use veil_storage::{KeyValueStore, keys};
use veil_types::AppId;

/// A ready-to-open install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub app_id: AppId,
    pub manifest: ResolvedLink,
    pub trigger_url: String,
    /// True for a paid app this device has not unlocked locally. The caller
    /// should ask the user before opening.
    pub needs_confirmation: bool,
}

/// Why an install could not be triggered, in a form fit for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
    /// The trigger URL as first attempted.
    pub url: String,
    pub message: String,
    /// Text to offer for copying so the user can open it by hand.
    pub clipboard_text: String,
}

impl InstallFailure {
    fn for_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            message: format!(
                "Could not open the install URL. Possible causes:\n\
                 1. the URL is malformed\n\
                 2. the URL is too long ({} characters)\n\
                 3. the system does not allow the install scheme\n\
                 Copy the URL and contact the developer.",
                url.chars().count()
            ),
            clipboard_text: url.to_string(),
        }
    }
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What happened when an install was triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Opened,
    /// The URL opened only after sanitizing; carries the URL that worked.
    OpenedAfterSanitize(String),
    Failed(InstallFailure),
}

impl InstallOutcome {
    #[must_use]
    pub fn is_opened(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Builds install triggers and opens them.
pub struct Installer {
    resolver: LinkResolver,
    opener: Arc<dyn UrlOpener>,
    store: Arc<dyn KeyValueStore>,
}

impl Installer {
    pub fn new(
        resolver: LinkResolver,
        opener: Arc<dyn UrlOpener>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            resolver,
            opener,
            store,
        }
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// Resolves `locator` and wraps it in the install trigger.
    pub fn trigger_for(&self, locator: &str) -> (ResolvedLink, String) {
        let manifest = self.resolver.resolve(locator);
        let trigger = install_trigger(self.resolver.config(), &manifest.url);
        (manifest, trigger)
    }

    /// Prepares the install of `app_id`.
    ///
    /// Free apps and apps unlocked on this device install directly; others
    /// need a confirmation first.
    ///
    /// # Errors
    ///
    /// [`InstallError::MissingManifest`] if `locator` is absent or blank,
    /// [`InstallError::Storage`] if the unlock flag cannot be read.
    pub fn plan(
        &self,
        app_id: &AppId,
        requires_key: bool,
        locator: Option<&str>,
    ) -> InstallResult<InstallPlan> {
        let locator = locator
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| InstallError::MissingManifest(app_id.to_string()))?;

        let unlocked = self
            .store
            .get_bool(&keys::app_unlocked(app_id.as_str()))?
            .unwrap_or(false);
        let (manifest, trigger_url) = self.trigger_for(locator);

        Ok(InstallPlan {
            app_id: app_id.clone(),
            manifest,
            trigger_url,
            needs_confirmation: requires_key && !unlocked,
        })
    }

    /// Opens the plan's trigger.
    pub async fn install(&self, plan: &InstallPlan) -> InstallOutcome {
        let outcome = self.open_trigger(&plan.trigger_url).await;
        match &outcome {
            InstallOutcome::Failed(failure) => {
                warn!(app = %plan.app_id, url = %failure.url, "install trigger failed");
            }
            _ => info!(app = %plan.app_id, kind = ?plan.manifest.kind, "install triggered"),
        }
        outcome
    }

    /// Opens `url`, retrying once with a sanitized copy if the first
    /// attempt fails. Never errors: a second failure becomes
    /// [`InstallOutcome::Failed`].
    pub async fn open_trigger(&self, url: &str) -> InstallOutcome {
        let first = match self.opener.open(url).await {
            Ok(()) => return InstallOutcome::Opened,
            Err(e) => e,
        };

        let sanitized = sanitize(url);
        if sanitized == url {
            warn!(error = %first, "install URL failed to open and has nothing to sanitize");
            return InstallOutcome::Failed(InstallFailure::for_url(url));
        }

        warn!(error = %first, "install URL failed to open, retrying sanitized");
        match self.opener.open(&sanitized).await {
            Ok(()) => InstallOutcome::OpenedAfterSanitize(sanitized),
            Err(e) => {
                warn!(error = %e, "sanitized install URL failed to open");
                InstallOutcome::Failed(InstallFailure::for_url(url))
            }
        }
    }
}
