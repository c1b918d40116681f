//! Shared test helpers for entitlement tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use veil_client::{Binding, BindingStatus, ClientError, ClientResult, VerifyOutcome};
use veil_license::{EntitlementAuthority, EntitlementResolver};
use veil_storage::{KeyValueStore, MemoryStore};
use veil_types::{AppId, DeviceId, FixedIdentity};

/// Scripted authority recording what it was asked.
#[derive(Default)]
pub struct FakeAuthority {
    pub status: Mutex<Option<BindingStatus>>,
    pub outcome: Mutex<Option<VerifyOutcome>>,
    pub refresh_ok: Mutex<Option<bool>>,
    pub redeemed: Mutex<Vec<(String, String, String)>>,
}

impl FakeAuthority {
    pub fn bound_to(app_ids: &[Option<&str>]) -> Self {
        let fake = Self::default();
        *fake.status.lock().unwrap() = Some(BindingStatus {
            bound: true,
            bindings: app_ids
                .iter()
                .map(|id| Binding {
                    app_id: id.map(String::from),
                })
                .collect(),
        });
        fake
    }

    pub fn accepting(plist: Option<&str>, message: Option<&str>) -> Self {
        let fake = Self::default();
        *fake.status.lock().unwrap() = Some(BindingStatus::unbound());
        *fake.outcome.lock().unwrap() = Some(VerifyOutcome {
            success: true,
            message: message.map(String::from),
            plist: plist.map(String::from),
        });
        fake
    }

    pub fn rejecting(message: &str) -> Self {
        let fake = Self::default();
        *fake.outcome.lock().unwrap() = Some(VerifyOutcome {
            success: false,
            message: Some(message.to_string()),
            plist: None,
        });
        fake
    }
}

#[async_trait]
impl EntitlementAuthority for FakeAuthority {
    async fn binding_status(&self, _udid: &DeviceId) -> ClientResult<BindingStatus> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::Unreachable("offline".into()))
    }

    async fn redeem(
        &self,
        card_key: &str,
        app_id: &AppId,
        udid: &DeviceId,
    ) -> ClientResult<VerifyOutcome> {
        self.redeemed.lock().unwrap().push((
            card_key.to_string(),
            app_id.to_string(),
            udid.to_string(),
        ));
        self.outcome
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::Timeout("slow".into()))
    }

    async fn refresh(&self, _app_id: &AppId, _udid: &DeviceId) -> ClientResult<bool> {
        self.refresh_ok
            .lock()
            .unwrap()
            .ok_or_else(|| ClientError::Status(500))
    }
}

pub fn device() -> DeviceId {
    DeviceId::new("DEVICE-TEST").unwrap()
}

pub fn app(id: &str) -> AppId {
    AppId::new(id).unwrap()
}

/// Builds a resolver over `authority` with a fresh in-memory store.
pub fn resolver(
    authority: FakeAuthority,
) -> (EntitlementResolver, Arc<FakeAuthority>, Arc<MemoryStore>) {
    let authority = Arc::new(authority);
    let store = Arc::new(MemoryStore::new());
    let resolver = EntitlementResolver::new(
        authority.clone(),
        store.clone() as Arc<dyn KeyValueStore>,
        Arc::new(FixedIdentity::new(device())),
    );
    (resolver, authority, store)
}
