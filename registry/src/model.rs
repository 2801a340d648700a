use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A registered host that can be woken by its hardware address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub description: Option<String>,
    #[sqlx(rename = "device_group")]
    pub group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a request addresses a device: the legacy routes use the name,
/// the `/api` routes use the generated id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKey {
    Id(Uuid),
    Name(String),
}

impl DeviceKey {
    /// A string that is not a UUID can never name a stored device.
    pub fn from_id(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(DeviceKey::Id)
            .map_err(|_| Error::DeviceNotFound)
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKey::Id(id) => write!(f, "id={}", id),
            DeviceKey::Name(name) => write!(f, "name={}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDevice {
    pub name: String,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
}

/// Replacement for every mutable field of a device. Fields left as `None`
/// are cleared in storage, not preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
}

/// Audit record of an action taken against a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub device_id: Uuid,
    pub action: String,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Activity with its device resolved at read time; `device` is `None`
/// when the referenced device has since been deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    #[serde(flatten)]
    pub activity: Activity,
    pub device: Option<Device>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub device_id: Uuid,
    pub action: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityFilter {
    pub device_id: Option<Uuid>,
    pub status: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Result of waking one device. `activity` is `None` when the packet went
/// out but the log append failed; `warning` then carries the reason.
#[derive(Debug, Clone)]
pub struct WakeReport {
    pub device: Device,
    pub activity: Option<Activity>,
    pub warning: Option<String>,
}

/// Per-identifier entry of a bulk wake response
#[derive(Debug, Clone, Serialize)]
pub struct WakeOutcome {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of device create/update requests on both route generations.
/// Everything is optional here so missing fields surface as validation
/// errors instead of body rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub name: Option<String>,
    #[serde(alias = "mac")]
    pub mac_address: Option<String>,
    #[serde(alias = "ip")]
    pub ip_address: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeRequest {
    pub mac: Option<String>,
    pub mac_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityRequest {
    pub device: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub device: Option<String>,
    pub status: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityDeleteQuery {
    pub device: Option<String>,
}
