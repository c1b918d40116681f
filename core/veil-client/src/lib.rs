//! Resilient client for the Veil catalog service.
//!
//! Requests go through three layers:
//!
//! 1. [`EndpointRouter`] picks the base URL: the primary, or one of an
//!    ordered list of fallbacks. Two consecutive failed requests against the
//!    current endpoint rotate to the next one, wrapping back to the primary.
//! 2. [`RetryPolicy`] retries a single request a bounded number of times
//!    with a scheduled delay before reporting one terminal error.
//! 3. [`ResponseShape`] classifies the JSON body, transparently decrypting
//!    envelopes, so that callers only see plain values.
//!
//! [`ApiClient`] ties the three together and exposes one method per remote
//! endpoint.

mod api;
mod config;
mod error;
mod models;
mod response;
mod retry;
mod router;

pub use api::ApiClient;
pub use config::{ClientConfig, Timeouts};
pub use error::{ClientError, ClientResult};
pub use models::{Binding, BindingStatus, ServerApp, VerifyOutcome};
pub use response::{ResponseShape, clean_body, parse_body};
pub use retry::RetryPolicy;
pub use router::{EndpointRouter, Selection};
