use crate::errors::Result;
use crate::metrics::{ACTIVITY_LOG_FAILURES_TOTAL, BULK_WAKE_SIZE};
use crate::model::{DeviceKey, NewActivity, WakeOutcome, WakeReport};
use crate::store::{ActivityLog, DeviceStore};
use crate::wake::WakeDispatcher;
use tracing::{debug, info, warn};

pub const WAKE_ACTION: &str = "wake";
pub const WAKE_STATUS_SENT: &str = "sent";

/// Resolves the device, sends the packet, then logs the wake.
///
/// A failed log append does not undo the send: the packet is already on
/// the wire, so the report carries a warning instead of an error. A crash
/// between the send and the append leaves no activity behind.
pub async fn wake_device(
    devices: &dyn DeviceStore,
    activities: &dyn ActivityLog,
    dispatcher: &dyn WakeDispatcher,
    key: &DeviceKey,
) -> Result<WakeReport> {
    let device = devices.get(key).await?;

    dispatcher.send(&device.mac_address).await?;

    let logged = activities
        .record(NewActivity {
            device_id: device.id,
            action: WAKE_ACTION.to_string(),
            status: Some(WAKE_STATUS_SENT.to_string()),
        })
        .await;

    match logged {
        Ok(activity) => {
            debug!("Logged wake of {} as activity {}", device.name, activity.id);
            Ok(WakeReport {
                device,
                activity: Some(activity),
                warning: None,
            })
        }
        Err(e) => {
            ACTIVITY_LOG_FAILURES_TOTAL.inc();
            warn!("Woke {} but failed to record activity: {}", device.name, e);
            Ok(WakeReport {
                device,
                activity: None,
                warning: Some(format!("Wake was sent but not logged: {}", e)),
            })
        }
    }
}

/// Wakes each id in order. One failure never stops the rest; nothing is
/// returned until the whole list has been processed.
pub async fn bulk_wake(
    devices: &dyn DeviceStore,
    activities: &dyn ActivityLog,
    dispatcher: &dyn WakeDispatcher,
    ids: &[String],
) -> Vec<WakeOutcome> {
    BULK_WAKE_SIZE.observe(ids.len() as f64);
    info!("Starting bulk wake of {} devices", ids.len());

    let mut outcomes = Vec::with_capacity(ids.len());
    for id in ids {
        let result = match DeviceKey::from_id(id) {
            Ok(key) => wake_device(devices, activities, dispatcher, &key).await,
            Err(e) => Err(e),
        };

        outcomes.push(match result {
            Ok(report) => WakeOutcome {
                id: id.clone(),
                success: true,
                device: Some(report.device),
                warning: report.warning,
                error: None,
            },
            Err(e) => {
                debug!("Bulk wake of {} failed: {}", id, e);
                WakeOutcome {
                    id: id.clone(),
                    success: false,
                    device: None,
                    warning: None,
                    error: Some(e.to_string()),
                }
            }
        });
    }

    let succeeded = outcomes.iter().filter(|o| o.success).count();
    info!(
        "Bulk wake finished: {} sent, {} failed",
        succeeded,
        outcomes.len() - succeeded
    );
    outcomes
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::model::{ActivityFilter, NewDevice};
    use crate::store::memory::{MemoryActivityLog, MemoryDeviceStore};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every MAC it is asked to wake; fails for MACs in `fail_for`.
    #[derive(Default, Clone)]
    pub struct ScriptedDispatcher {
        pub sent: Arc<Mutex<Vec<String>>>,
        pub fail_for: Vec<String>,
    }

    #[async_trait]
    impl WakeDispatcher for ScriptedDispatcher {
        async fn send(&self, mac_address: &str) -> Result<()> {
            if self.fail_for.iter().any(|m| m == mac_address) {
                return Err(Error::Dispatch("no usable network interface".to_string()));
            }
            self.sent.lock().unwrap().push(mac_address.to_string());
            Ok(())
        }
    }

    fn new_device(name: &str, mac: &str) -> NewDevice {
        NewDevice {
            name: name.to_string(),
            mac_address: mac.to_string(),
            ip_address: None,
            description: None,
            group: None,
        }
    }

    #[tokio::test]
    async fn test_wake_logs_activity() {
        let devices = MemoryDeviceStore::default();
        let log = MemoryActivityLog::new(devices.clone());
        let dispatcher = ScriptedDispatcher::default();
        let tv = devices.add(new_device("tv1", "AA:BB:CC:DD:EE:FF")).await.unwrap();

        let report = wake_device(&devices, &log, &dispatcher, &DeviceKey::Id(tv.id))
            .await
            .unwrap();

        assert_eq!(report.device.id, tv.id);
        assert!(report.warning.is_none());
        let activity = report.activity.unwrap();
        assert_eq!(activity.action, "wake");
        assert_eq!(activity.status.as_deref(), Some("sent"));
        assert_eq!(*dispatcher.sent.lock().unwrap(), vec!["AA:BB:CC:DD:EE:FF"]);
    }

    #[tokio::test]
    async fn test_wake_unknown_device_records_nothing() {
        let devices = MemoryDeviceStore::default();
        let log = MemoryActivityLog::new(devices.clone());
        let dispatcher = ScriptedDispatcher::default();

        let key = DeviceKey::Id(uuid::Uuid::new_v4());
        let result = wake_device(&devices, &log, &dispatcher, &key).await;

        assert!(matches!(result, Err(Error::DeviceNotFound)));
        assert_eq!(log.len(), 0);
        assert!(dispatcher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_records_nothing() {
        let devices = MemoryDeviceStore::default();
        let log = MemoryActivityLog::new(devices.clone());
        let dispatcher = ScriptedDispatcher {
            fail_for: vec!["AA:BB:CC:DD:EE:FF".to_string()],
            ..Default::default()
        };
        let tv = devices.add(new_device("tv1", "AA:BB:CC:DD:EE:FF")).await.unwrap();

        let result = wake_device(&devices, &log, &dispatcher, &DeviceKey::Id(tv.id)).await;

        assert!(matches!(result, Err(Error::Dispatch(_))));
        assert_eq!(log.len(), 0);
    }

    #[tokio::test]
    async fn test_log_failure_keeps_sent_outcome() {
        let devices = MemoryDeviceStore::default();
        let log = MemoryActivityLog::failing(devices.clone());
        let dispatcher = ScriptedDispatcher::default();
        let tv = devices.add(new_device("tv1", "AA:BB:CC:DD:EE:FF")).await.unwrap();

        let report = wake_device(&devices, &log, &dispatcher, &DeviceKey::Id(tv.id))
            .await
            .unwrap();

        assert!(report.activity.is_none());
        assert!(report.warning.is_some());
        assert_eq!(dispatcher.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_wake_reports_each_item() {
        let devices = MemoryDeviceStore::default();
        let log = MemoryActivityLog::new(devices.clone());
        let dispatcher = ScriptedDispatcher {
            fail_for: vec!["22:22:22:22:22:22".to_string()],
            ..Default::default()
        };
        let a = devices.add(new_device("a", "11:11:11:11:11:11")).await.unwrap();
        let b = devices.add(new_device("b", "22:22:22:22:22:22")).await.unwrap();
        let c = devices.add(new_device("c", "33:33:33:33:33:33")).await.unwrap();
        let missing = uuid::Uuid::new_v4().to_string();

        let ids = vec![
            a.id.to_string(),
            missing.clone(),
            b.id.to_string(),
            "garbage".to_string(),
            c.id.to_string(),
        ];
        let outcomes = bulk_wake(&devices, &log, &dispatcher, &ids).await;

        assert_eq!(outcomes.len(), 5);
        let success: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(success, vec![true, false, false, false, true]);
        assert_eq!(outcomes[1].id, missing);
        assert_eq!(outcomes[1].error.as_deref(), Some("Device not found"));
        assert!(outcomes[2].error.as_deref().unwrap().starts_with("Failed to send WOL packet"));
        assert_eq!(outcomes[3].error.as_deref(), Some("Device not found"));

        let logged = log.query(&ActivityFilter::default()).await.unwrap();
        let logged_ids: Vec<_> = logged.iter().map(|r| r.activity.device_id).collect();
        assert_eq!(logged_ids, vec![a.id, c.id]);
    }
}
