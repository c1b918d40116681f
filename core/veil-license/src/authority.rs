//! The remote party that grants entitlements.

use async_trait::async_trait;
use veil_client::{ApiClient, BindingStatus, ClientResult, VerifyOutcome};
use veil_types::{AppId, DeviceId};

/// Server operations the resolver depends on.
#[async_trait]
pub trait EntitlementAuthority: Send + Sync {
    /// Returns the grants held for `udid`.
    async fn binding_status(&self, udid: &DeviceId) -> ClientResult<BindingStatus>;

    /// Redeems `card_key` for `app_id` on `udid`.
    async fn redeem(
        &self,
        card_key: &str,
        app_id: &AppId,
        udid: &DeviceId,
    ) -> ClientResult<VerifyOutcome>;

    /// Asks the server to refresh `app_id` for `udid`.
    async fn refresh(&self, app_id: &AppId, udid: &DeviceId) -> ClientResult<bool>;
}

#[async_trait]
impl EntitlementAuthority for ApiClient {
    async fn binding_status(&self, udid: &DeviceId) -> ClientResult<BindingStatus> {
        self.check_udid(udid).await
    }

    async fn redeem(
        &self,
        card_key: &str,
        app_id: &AppId,
        udid: &DeviceId,
    ) -> ClientResult<VerifyOutcome> {
        self.verify_card(card_key, app_id, udid).await
    }

    async fn refresh(&self, app_id: &AppId, udid: &DeviceId) -> ClientResult<bool> {
        self.refresh_app(app_id, udid).await
    }
}
