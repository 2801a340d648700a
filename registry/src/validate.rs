use crate::errors::{Error, Result};
use crate::model::{
    ActivityFilter, ActivityQuery, ActivityRequest, DeviceRequest, DeviceUpdate, NewActivity,
    NewDevice, WakeRequest,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Empty or whitespace-only strings count as absent
fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(Error::MissingField(field))
}

fn parse_uuid(raw: &str, field: &'static str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::invalid(field, e.to_string()))
}

fn parse_time(raw: &str, field: &'static str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::invalid(field, e.to_string()))
}

pub fn new_device(req: DeviceRequest) -> Result<NewDevice> {
    Ok(NewDevice {
        name: required(req.name, "name")?,
        mac_address: required(req.mac_address, "macAddress")?,
        ip_address: req.ip_address,
        description: req.description,
        group: req.group,
    })
}

/// The name in the body, if any, is ignored: devices are never renamed.
pub fn device_update(req: DeviceRequest) -> Result<DeviceUpdate> {
    Ok(DeviceUpdate {
        mac_address: required(req.mac_address, "macAddress")?,
        ip_address: req.ip_address,
        description: req.description,
        group: req.group,
    })
}

pub fn wake_mac(req: WakeRequest) -> Result<String> {
    required(req.mac.or(req.mac_address), "mac")
}

pub fn new_activity(req: ActivityRequest) -> Result<NewActivity> {
    let device = required(req.device, "device")?;
    Ok(NewActivity {
        device_id: parse_uuid(&device, "device")?,
        action: required(req.action, "action")?,
        status: req.status,
    })
}

pub fn activity_filter(query: ActivityQuery) -> Result<ActivityFilter> {
    Ok(ActivityFilter {
        device_id: query
            .device
            .as_deref()
            .map(|d| parse_uuid(d, "device"))
            .transpose()?,
        status: query.status,
        start: query
            .start
            .as_deref()
            .map(|s| parse_time(s, "start"))
            .transpose()?,
        end: query
            .end
            .as_deref()
            .map(|s| parse_time(s, "end"))
            .transpose()?,
    })
}

pub fn optional_device(device: Option<String>) -> Result<Option<Uuid>> {
    device
        .as_deref()
        .map(|d| parse_uuid(d, "device"))
        .transpose()
}

/// Bulk wake accepts any JSON values in `ids`; non-string entries are kept
/// in their JSON text form and simply fail to resolve.
pub fn bulk_ids(body: &Value) -> Result<Vec<String>> {
    let ids = body
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid("ids", "must be an array"))?;

    Ok(ids
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}
