use crate::errors::{Error, Result};
use crate::model::{
    Activity, ActivityFilter, ActivityRecord, Device, DeviceKey, DeviceUpdate, NewActivity,
    NewDevice,
};
use crate::store::{ActivityLog, DeviceStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::QueryAs;
use sqlx::Postgres;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const DEVICE_COLUMNS: &str =
    "id, name, mac_address, ip_address, description, device_group, created_at, updated_at";

const ACTIVITY_SELECT: &str = r#"
    SELECT a.id, a.device_id, a.action, a.status, a.created_at,
           d.id AS d_id, d.name AS d_name, d.mac_address AS d_mac_address,
           d.ip_address AS d_ip_address, d.description AS d_description,
           d.device_group AS d_group, d.created_at AS d_created_at,
           d.updated_at AS d_updated_at
    FROM activities a
    LEFT JOIN devices d ON d.id = a.device_id
    "#;

pub async fn make_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == "23505"),
        _ => false,
    }
}

fn key_clause(key: &DeviceKey, placeholder: usize) -> String {
    match key {
        DeviceKey::Id(_) => format!("id = ${}", placeholder),
        DeviceKey::Name(_) => format!("name = ${}", placeholder),
    }
}

fn bind_key<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    key: &'q DeviceKey,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    match key {
        DeviceKey::Id(id) => query.bind(*id),
        DeviceKey::Name(name) => query.bind(name.as_str()),
    }
}

#[derive(Debug, Clone)]
pub struct PgDeviceStore {
    pool: PgPool,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    async fn add(&self, new: NewDevice) -> Result<Device> {
        let query = format!(
            "INSERT INTO devices (id, name, mac_address, ip_address, description, device_group, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {}",
            DEVICE_COLUMNS
        );

        let result = sqlx::query_as::<_, Device>(&query)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.mac_address)
            .bind(&new.ip_address)
            .bind(&new.description)
            .bind(&new.group)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(device) => {
                debug!("Inserted device {} ({})", device.name, device.id);
                Ok(device)
            }
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicateName(new.name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, key: &DeviceKey, update: DeviceUpdate) -> Result<Device> {
        let query = format!(
            "UPDATE devices
             SET mac_address = $2, ip_address = $3, description = $4, device_group = $5, updated_at = $6
             WHERE {}
             RETURNING {}",
            key_clause(key, 1),
            DEVICE_COLUMNS
        );

        bind_key(sqlx::query_as::<_, Device>(&query), key)
            .bind(&update.mac_address)
            .bind(&update.ip_address)
            .bind(&update.description)
            .bind(&update.group)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::DeviceNotFound)
    }

    async fn remove(&self, key: &DeviceKey) -> Result<Device> {
        let query = format!(
            "DELETE FROM devices WHERE {} RETURNING {}",
            key_clause(key, 1),
            DEVICE_COLUMNS
        );

        bind_key(sqlx::query_as::<_, Device>(&query), key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::DeviceNotFound)
    }

    async fn get(&self, key: &DeviceKey) -> Result<Device> {
        let query = format!(
            "SELECT {} FROM devices WHERE {}",
            DEVICE_COLUMNS,
            key_clause(key, 1)
        );

        bind_key(sqlx::query_as::<_, Device>(&query), key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::DeviceNotFound)
    }

    async fn list(&self) -> Result<Vec<Device>> {
        let query = format!("SELECT {} FROM devices ORDER BY name", DEVICE_COLUMNS);
        let devices = sqlx::query_as::<_, Device>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(devices)
    }

    async fn groups(&self) -> Result<Vec<String>> {
        let groups = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT device_group FROM devices
             WHERE device_group IS NOT NULL AND device_group <> ''
             ORDER BY device_group",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }
}

/// Activity joined with the columns of its device, if the device still exists
#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    device_id: Uuid,
    action: String,
    status: Option<String>,
    created_at: DateTime<Utc>,
    d_id: Option<Uuid>,
    d_name: Option<String>,
    d_mac_address: Option<String>,
    d_ip_address: Option<String>,
    d_description: Option<String>,
    d_group: Option<String>,
    d_created_at: Option<DateTime<Utc>>,
    d_updated_at: Option<DateTime<Utc>>,
}

impl From<ActivityRow> for ActivityRecord {
    fn from(row: ActivityRow) -> Self {
        let device = match (
            row.d_id,
            row.d_name,
            row.d_mac_address,
            row.d_created_at,
            row.d_updated_at,
        ) {
            (Some(id), Some(name), Some(mac_address), Some(created_at), Some(updated_at)) => {
                Some(Device {
                    id,
                    name,
                    mac_address,
                    ip_address: row.d_ip_address,
                    description: row.d_description,
                    group: row.d_group,
                    created_at,
                    updated_at,
                })
            }
            _ => None,
        };

        ActivityRecord {
            activity: Activity {
                id: row.id,
                device_id: row.device_id,
                action: row.action,
                status: row.status,
                created_at: row.created_at,
            },
            device,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn record(&self, new: NewActivity) -> Result<Activity> {
        let activity = sqlx::query_as::<_, Activity>(
            "INSERT INTO activities (id, device_id, action, status, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, device_id, action, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.device_id)
        .bind(&new.action)
        .bind(&new.status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(
            "Recorded activity {} '{}' for device {}",
            activity.id, activity.action, activity.device_id
        );
        Ok(activity)
    }

    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>> {
        let mut conditions = Vec::new();

        if filter.device_id.is_some() {
            conditions.push(format!("a.device_id = ${}", conditions.len() + 1));
        }
        if filter.status.is_some() {
            conditions.push(format!("a.status = ${}", conditions.len() + 1));
        }
        if filter.start.is_some() {
            conditions.push(format!("a.created_at >= ${}", conditions.len() + 1));
        }
        if filter.end.is_some() {
            conditions.push(format!("a.created_at <= ${}", conditions.len() + 1));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!("{} {} ORDER BY a.seq ASC", ACTIVITY_SELECT, where_clause);

        // Bind in the same order the conditions were pushed
        let mut query_builder = sqlx::query_as::<_, ActivityRow>(&query);
        if let Some(device_id) = filter.device_id {
            query_builder = query_builder.bind(device_id);
        }
        if let Some(status) = &filter.status {
            query_builder = query_builder.bind(status);
        }
        if let Some(start) = filter.start {
            query_builder = query_builder.bind(start);
        }
        if let Some(end) = filter.end {
            query_builder = query_builder.bind(end);
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ActivityRecord::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<ActivityRecord> {
        let query = format!("{} WHERE a.id = $1", ACTIVITY_SELECT);
        sqlx::query_as::<_, ActivityRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ActivityRecord::from)
            .ok_or(Error::ActivityNotFound)
    }

    async fn delete_all(&self, device_id: Option<Uuid>) -> Result<u64> {
        let result = match device_id {
            Some(device_id) => {
                sqlx::query("DELETE FROM activities WHERE device_id = $1")
                    .bind(device_id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM activities")
                    .execute(&self.pool)
                    .await?
            }
        };

        info!(
            "Deleted {} activities (device filter: {:?})",
            result.rows_affected(),
            device_id
        );
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_clause() {
        assert_eq!(key_clause(&DeviceKey::Id(Uuid::nil()), 1), "id = $1");
        assert_eq!(
            key_clause(&DeviceKey::Name("tv1".to_string()), 3),
            "name = $3"
        );
    }

    #[test]
    fn test_pool_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_dangling_device_reference_resolves_to_none() {
        let now = Utc::now();
        let row = ActivityRow {
            id: Uuid::new_v4(),
            device_id: Uuid::new_v4(),
            action: "wake".to_string(),
            status: Some("sent".to_string()),
            created_at: now,
            d_id: None,
            d_name: None,
            d_mac_address: None,
            d_ip_address: None,
            d_description: None,
            d_group: None,
            d_created_at: None,
            d_updated_at: None,
        };

        let record = ActivityRecord::from(row);
        assert!(record.device.is_none());
        assert_eq!(record.activity.action, "wake");
    }
}
