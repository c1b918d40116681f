//! Device identity and per-app entitlements for the Veil client.
//!
//! This crate handles:
//! - Resolving the persisted device identifier, migrating legacy storage
//! - Deciding whether an application still needs a card key on this device
//! - Redeeming card keys and caching the resulting unlock locally
//! - Best-effort entitlement refresh
//!
//! # Design Principles
//!
//! - **Server is the truth**: local unlock flags are an advisory cache. A
//!   successful server confirmation always overwrites them; nothing local
//!   ever overrides the server.
//! - **Stable identity**: once a device identifier is persisted it is never
//!   regenerated. Only an explicit user action changes it.
//! - **Fail towards asking**: if the binding lookup fails, the app is treated
//!   as still requiring verification.
//!
//! # Entitlement states
//!
//! ```text
//! Unknown ──requires_verification──▶ Checking ──┬──▶ Unlocked
//!                                               └──▶ NeedsCard ──verify_card──▶ Unlocked
//! ```

mod authority;
mod device;
mod error;
mod resolver;

pub use authority::EntitlementAuthority;
pub use device::{DeviceIdentity, DeviceInfo, MachineIdentifier, NoPlatformIdentifier, PlatformIdentifier};
pub use error::{EntitlementError, EntitlementResult};
pub use resolver::{EntitlementRecord, EntitlementResolver, EntitlementState, VerifyResult};
