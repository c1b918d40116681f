//! Catalog service client.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{BindingStatus, ServerApp, VerifyOutcome};
use crate::response::{ResponseShape, parse_body};
use crate::retry::RetryPolicy;
use crate::router::{EndpointRouter, Selection};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use veil_crypto::{Envelope, EnvelopeCodec};
use veil_types::{AppId, DeviceId};

/// One logical request.
struct Call {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    timeout: Duration,
    retry: bool,
}

impl Call {
    fn get(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout,
            retry: true,
        }
    }

    fn post(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(path, timeout)
        }
    }

    fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn once(mut self) -> Self {
        self.retry = false;
        self
    }
}

/// Client for the `/api/client` endpoints.
///
/// Cheap to share: wrap it in an `Arc` and hand it to every service that
/// talks to the catalog.
pub struct ApiClient {
    config: ClientConfig,
    http: Client,
    router: Arc<EndpointRouter>,
    codec: EnvelopeCodec,
}

impl ApiClient {
    /// Creates a client using the embedded envelope key.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_codec(config, EnvelopeCodec::embedded())
    }

    /// Creates a client with an explicit envelope codec.
    pub fn with_codec(config: ClientConfig, codec: EnvelopeCodec) -> ClientResult<Self> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;
        let router = Arc::new(EndpointRouter::from_config(&config)?);
        Ok(Self {
            config,
            http,
            router,
            codec,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<EndpointRouter> {
        &self.router
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    async fn send_once(&self, selection: &Selection, call: &Call) -> ClientResult<Vec<u8>> {
        let url = selection.url(&call.path);
        debug!(method = %call.method, %url, "sending request");

        let mut request = self
            .http
            .request(call.method.clone(), &url)
            .timeout(call.timeout)
            .header(ACCEPT, "application/json");
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Sends `call` against the current endpoint with retry, returning the
    /// parsed body. Terminal failures are charged to the endpoint.
    async fn send(&self, call: Call) -> ClientResult<(Selection, Value)> {
        let selection = self.router.current();
        let policy = if call.retry {
            self.config.retry.clone()
        } else {
            RetryPolicy::none()
        };

        let result = match policy.run(|_| self.send_once(&selection, &call)).await {
            Ok(raw) => parse_body(&raw),
            Err(e) => Err(e),
        };
        match result {
            Ok(body) => Ok((selection, body)),
            Err(e) => Err(self.fail(&selection, &call.path, e)),
        }
    }

    fn fail(&self, selection: &Selection, path: &str, error: ClientError) -> ClientError {
        warn!(endpoint = %selection.base_url(), path, error = %error, "request failed");
        if error.counts_against_endpoint() {
            self.router.record_failure(selection);
        }
        error
    }

    /// Fails with [`ClientError::Rejected`] if the body says `success: false`.
    fn ensure_success(body: &Value) -> ClientResult<()> {
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(ClientError::Rejected(message));
        }
        Ok(())
    }

    /// Checks that the current endpoint answers `GET /ping` with 200.
    pub async fn ping(&self) -> ClientResult<()> {
        self.ping_at(&self.router.current()).await
    }

    async fn ping_at(&self, selection: &Selection) -> ClientResult<()> {
        let call = Call::get("ping", self.config.timeouts.ping()).once();
        self.send_once(selection, &call).await.map(|_| ())
    }

    /// Pings the endpoint in use and rotates away from it immediately if it
    /// does not answer, unless something else already rotated meanwhile.
    /// Returns true if the endpoint was healthy.
    pub async fn probe_primary(&self) -> bool {
        let selection = self.router.current();
        match self.ping_at(&selection).await {
            Ok(()) => {
                info!(endpoint = %selection.base_url(), "API endpoint reachable");
                true
            }
            Err(e) => {
                warn!(
                    endpoint = %selection.base_url(),
                    error = %e,
                    "API endpoint unreachable at startup"
                );
                self.router.rotate_from(&selection);
                false
            }
        }
    }

    /// Lists the catalog. Records missing required fields are skipped.
    pub async fn list_apps(&self) -> ClientResult<Vec<ServerApp>> {
        let call = Call::get("apps", self.config.timeouts.api());
        let path = call.path.clone();
        let (selection, body) = self.send(call).await?;

        let records = Self::ensure_success(&body)
            .and_then(|()| ResponseShape::classify(body, &self.codec))
            .map(|shape| {
                debug!(shape = shape.kind(), "decoded app list");
                shape.into_records()
            })
            .map_err(|e| self.fail(&selection, &path, e))?;

        let apps: Vec<ServerApp> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<ServerApp>(record) {
                Ok(app) => Some(app),
                Err(e) => {
                    debug!(error = %e, "skipping incomplete app record");
                    None
                }
            })
            .collect();

        self.router.record_success(&selection);
        info!(count = apps.len(), "fetched app list");
        Ok(apps)
    }

    /// Fetches one catalog entry as seen by `udid`.
    pub async fn app_detail(&self, app_id: &AppId, udid: &DeviceId) -> ClientResult<ServerApp> {
        let call = Call::get(
            format!("apps/{}", urlencoding::encode(app_id.as_str())),
            self.config.timeouts.api(),
        )
        .query("udid", udid.as_str());
        let path = call.path.clone();
        let (selection, body) = self.send(call).await?;

        let app = Self::ensure_success(&body)
            .and_then(|()| ResponseShape::classify(body, &self.codec))
            .and_then(|shape| {
                shape
                    .into_records()
                    .into_iter()
                    .find_map(|record| serde_json::from_value::<ServerApp>(record).ok())
                    .ok_or_else(|| {
                        ClientError::Malformed(format!("no usable record for app {app_id}"))
                    })
            })
            .map_err(|e| self.fail(&selection, &path, e))?;

        self.router.record_success(&selection);
        Ok(app)
    }

    /// Redeems a card key for `app_id` on device `udid`.
    ///
    /// A refused card is not an error at this layer: the outcome carries
    /// `success: false` and the server's message.
    pub async fn verify_card(
        &self,
        card_key: &str,
        app_id: &AppId,
        udid: &DeviceId,
    ) -> ClientResult<VerifyOutcome> {
        let call = Call::post("verify", self.config.timeouts.api()).json(json!({
            "cardKey": card_key,
            "appId": app_id.as_str(),
            "udid": udid.as_str(),
        }));
        let (selection, body) = self.send(call).await?;

        let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(String::from);
        let mut outcome = VerifyOutcome {
            success: body.get("success").and_then(Value::as_bool).unwrap_or(false),
            message: text(&body, "message"),
            plist: text(&body, "plist"),
        };

        if outcome.success && outcome.message.is_none() {
            if let Some(envelope) = body.get("data").and_then(Envelope::from_value) {
                match self.codec.open_json(&envelope) {
                    Ok(inner) => {
                        if let Some(success) = inner.get("success").and_then(Value::as_bool) {
                            outcome.success = success;
                        }
                        outcome.message = text(&inner, "message").or(outcome.message);
                        outcome.plist = text(&inner, "plist").or(outcome.plist);
                    }
                    Err(e) => warn!(error = %e, "could not open verification envelope"),
                }
            }
        }

        if outcome.success && outcome.message.is_none() {
            outcome.message = Some(VerifyOutcome::DEFAULT_SUCCESS_MESSAGE.to_string());
        }

        self.router.record_success(&selection);
        info!(app = %app_id, success = outcome.success, "card verification finished");
        Ok(outcome)
    }

    /// Asks the server to refresh `app_id` for `udid`. Returns whether the
    /// server reported success.
    pub async fn refresh_app(&self, app_id: &AppId, udid: &DeviceId) -> ClientResult<bool> {
        let call = Call::post(
            format!("refresh-app/{}", urlencoding::encode(app_id.as_str())),
            self.config.timeouts.api(),
        )
        .query("udid", udid.as_str());
        let (selection, body) = self.send(call).await?;

        let success = body.get("success").and_then(Value::as_bool) == Some(true)
            || body
                .get("status")
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case("success"))
            || body.get("data").is_some();

        self.router.record_success(&selection);
        Ok(success)
    }

    /// Looks up which grants the server holds for `udid`.
    ///
    /// Single attempt, no endpoint rotation. Any answer the client cannot
    /// read as a binding list means "not bound".
    pub async fn check_udid(&self, udid: &DeviceId) -> ClientResult<BindingStatus> {
        let selection = self.router.current();
        let call = Call::get("check-udid", self.config.timeouts.lookup())
            .query("udid", udid.as_str())
            .once();
        let raw = self.send_once(&selection, &call).await?;
        let body = parse_body(&raw)?;

        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Ok(BindingStatus::unbound());
        }
        let data = match ResponseShape::classify(body, &self.codec) {
            Ok(shape) => shape.into_value(),
            Err(e) => {
                debug!(error = %e, "unreadable binding payload");
                return Ok(BindingStatus::unbound());
            }
        };
        let mut status: BindingStatus = serde_json::from_value(data).unwrap_or_default();
        if status.bindings.is_empty() {
            status.bound = false;
        }
        debug!(bound = status.bound, bindings = status.bindings.len(), "binding status");
        Ok(status)
    }
}
