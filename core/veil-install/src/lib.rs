//! Install triggering for the Veil client.
//!
//! A catalog entry carries a *manifest locator*: a URL, a signed-download
//! path, an encrypted envelope or a bare `<iv>/<data>` pair.
//! [`LinkResolver`] turns it into an absolute manifest URL,
//! [`install_trigger`] wraps that in the platform's
//! `itms-services://?action=download-manifest&url=...` trigger, and
//! [`Installer`] hands the trigger to a [`UrlOpener`].
//!
//! Opening is forgiving. A failed open is retried once with the problem
//! characters percent-encoded; a second failure is reported as
//! [`InstallOutcome::Failed`] with text the user can copy.

mod config;
mod error;
mod installer;
mod locator;
mod opener;
mod trigger;

pub use config::InstallConfig;
pub use error::{InstallError, InstallResult};
pub use installer::{InstallFailure, InstallOutcome, InstallPlan, Installer};
pub use locator::{LinkResolver, LocatorKind, ResolvedLink};
pub use opener::{SystemOpener, UrlOpener};
pub use trigger::{install_trigger, sanitize};
