//! Device description sent with disguise checks.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use veil_types::{DeviceId, Timestamp};

const UNKNOWN: &str = "unknown";

/// Static facts about the host and application build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub app_version: String,
    pub build_number: String,
    pub device_model: String,
    pub os_version: String,
    /// IANA zone name, e.g. `Asia/Shanghai`.
    pub timezone: String,
    /// Locale identifier, e.g. `zh_CN`.
    pub locale: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            app_version: UNKNOWN.to_string(),
            build_number: UNKNOWN.to_string(),
            device_model: UNKNOWN.to_string(),
            os_version: UNKNOWN.to_string(),
            timezone: UNKNOWN.to_string(),
            locale: UNKNOWN.to_string(),
        }
    }
}

impl DeviceProfile {
    /// Reads timezone and locale from the process environment (`TZ`,
    /// `LC_ALL`, `LANG`). Other fields are left unknown.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let locale = var("LC_ALL")
            .or_else(|| var("LANG"))
            .map(|raw| raw.split('.').next().unwrap_or_default().to_string())
            .filter(|l| !l.is_empty());
        Self {
            timezone: var("TZ").unwrap_or_else(|| "UTC".to_string()),
            locale: locale.unwrap_or_else(|| UNKNOWN.to_string()),
            ..Self::default()
        }
    }
}

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: Timestamp,
}

/// Supplies the device position, when the host has one and may share it.
pub trait LocationProvider: Send + Sync {
    fn current(&self) -> Option<Location>;
}

/// A provider that never has a position.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn current(&self) -> Option<Location> {
        None
    }
}

/// Renders the `location` member of an advanced check.
#[must_use]
pub fn location_json(location: Option<&Location>) -> Value {
    match location {
        Some(fix) => json!({
            "available": true,
            "latitude": fix.latitude,
            "longitude": fix.longitude,
            "timestamp": fix.recorded_at.as_secs(),
        }),
        None => json!({ "available": false }),
    }
}

/// Request body of the basic check.
#[must_use]
pub fn basic_request(udid: &DeviceId, profile: &DeviceProfile) -> Value {
    json!({
        "udid": udid.as_str(),
        "app_version": profile.app_version,
    })
}

/// Request body of the advanced check.
#[must_use]
pub fn advanced_request(
    udid: &DeviceId,
    profile: &DeviceProfile,
    location: Option<&Location>,
    now: Timestamp,
) -> Value {
    json!({
        "udid": udid.as_str(),
        "app_version": profile.app_version,
        "build_number": profile.build_number,
        "device_model": profile.device_model,
        "os_version": profile.os_version,
        "location": location_json(location),
        "timezone": profile.timezone,
        "locale": profile.locale,
        "timestamp": now.as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udid() -> DeviceId {
        DeviceId::new("DEV-1").unwrap()
    }

    #[test]
    fn basic_request_has_two_fields() {
        let profile = DeviceProfile {
            app_version: "2.1".into(),
            ..DeviceProfile::default()
        };
        let body = basic_request(&udid(), &profile);
        assert_eq!(body, json!({"udid": "DEV-1", "app_version": "2.1"}));
    }

    #[test]
    fn advanced_request_without_location() {
        let body = advanced_request(
            &udid(),
            &DeviceProfile::default(),
            None,
            Timestamp::from_secs(1_700_000_000),
        );
        assert_eq!(body["location"], json!({"available": false}));
        assert_eq!(body["timestamp"], json!(1_700_000_000));
        assert_eq!(body["device_model"], json!("unknown"));
        assert_eq!(body.as_object().unwrap().len(), 9);
    }

    #[test]
    fn advanced_request_with_location() {
        let fix = Location {
            latitude: 31.2,
            longitude: 121.5,
            recorded_at: Timestamp::from_secs(42),
        };
        let body = advanced_request(&udid(), &DeviceProfile::default(), Some(&fix), Timestamp::from_secs(50));
        assert_eq!(
            body["location"],
            json!({"available": true, "latitude": 31.2, "longitude": 121.5, "timestamp": 42})
        );
    }
}
