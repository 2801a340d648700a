use crate::errors::Result;
use crate::model::{
    Activity, ActivityFilter, ActivityRecord, Device, DeviceKey, DeviceUpdate, NewActivity,
    NewDevice,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Device records. Name uniqueness is enforced by the backing store, not by
/// a lookup before insert.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn add(&self, new: NewDevice) -> Result<Device>;

    /// Replaces every mutable field; see [`DeviceUpdate`].
    async fn update(&self, key: &DeviceKey, update: DeviceUpdate) -> Result<Device>;

    /// Returns the removed record. Activities referencing it are kept.
    async fn remove(&self, key: &DeviceKey) -> Result<Device>;

    async fn get(&self, key: &DeviceKey) -> Result<Device>;

    async fn list(&self) -> Result<Vec<Device>>;

    /// Distinct non-empty group values, sorted
    async fn groups(&self) -> Result<Vec<String>>;
}

/// Append-only audit log of device actions
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, new: NewActivity) -> Result<Activity>;

    /// Matches in insertion order, each with its device resolved
    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>>;

    async fn get(&self, id: Uuid) -> Result<ActivityRecord>;

    /// Without a device every activity is deleted.
    async fn delete_all(&self, device_id: Option<Uuid>) -> Result<u64>;
}
