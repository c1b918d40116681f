//! Disguise decisions for the Veil client.
//!
//! The client boots into a decoy and asks a dedicated endpoint whether the
//! real application may be shown. The engine is cache-first and fail-safe:
//!
//! ```text
//!   cached verdict fresh? ── yes ──► Cache
//!          │ no (or forced)
//!          ▼
//!   network path ── Unavailable ──► Offline (cached flag)
//!          │
//!          ├─ Wifi / Cellular ──► advanced check
//!          └─ Other ────────────► basic check
//!                                      │
//!          ok ──► Server (persisted, expires at server time or now + 300 s)
//!          timeout / refused / 401 / 403 (advanced) ──► FailSafe (decoy, persisted)
//!          anything else ──► Fallback (cached flag)
//! ```
//!
//! A missing cached flag always means "keep the decoy".

mod config;
mod engine;
mod error;
mod network;
mod profile;
mod state;
mod verdict;

pub use config::DisguiseConfig;
pub use engine::{CheckKind, DecisionSource, DisguiseDecision, DisguiseEngine};
pub use error::{DisguiseError, DisguiseResult};
pub use network::{NetworkPath, ReachabilityProbe, StaticReachability, TcpReachability};
pub use profile::{
    DeviceProfile, Location, LocationProvider, NoLocation, advanced_request, basic_request,
    location_json,
};
pub use state::DisguiseState;
pub use verdict::Verdict;
