use crate::errors::Error;
use crate::metrics::DEVICES_CREATED_TOTAL;
use crate::model::{
    Activity, ActivityDeleteQuery, ActivityQuery, ActivityRecord, ActivityRequest, Device,
    DeviceKey, DeviceRequest, WakeOutcome, WakeRequest,
};
use crate::orchestrator;
use crate::store::{ActivityLog, DeviceStore};
use crate::validate;
use crate::wake::WakeDispatcher;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Handles owned by the process and shared by every request
#[derive(Clone)]
pub struct AppState {
    pub devices: Arc<dyn DeviceStore>,
    pub activities: Arc<dyn ActivityLog>,
    pub dispatcher: Arc<dyn WakeDispatcher>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/devices", get(list_devices).post(create_device))
        .route("/api/devices/bulk-wake", post(bulk_wake))
        .route(
            "/api/devices/:id",
            get(get_device).put(update_device).delete(delete_device),
        )
        .route("/api/devices/:id/wake", post(wake_device))
        .route("/api/groups", get(list_groups))
        .route(
            "/api/activities",
            get(list_activities)
                .post(create_activity)
                .delete(delete_activities),
        )
        .route("/api/activities/:id", get(get_activity))
        // Original, name-addressed routes
        .route("/wake", post(wake_mac))
        .route("/device", post(legacy_add_device))
        .route(
            "/device/:name",
            put(legacy_update_device).delete(legacy_delete_device),
        )
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError(Error::invalid("request body", rejection.body_text())))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| AppError(Error::invalid("query", rejection.body_text())))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<Device>>, AppError> {
    Ok(Json(state.devices.list().await?))
}

async fn create_device(
    State(state): State<AppState>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Device>), AppError> {
    let new = validate::new_device(body(payload)?)?;
    let device = state.devices.add(new).await?;
    DEVICES_CREATED_TOTAL.inc();
    info!("Device added: {} ({})", device.name, device.id);
    Ok((StatusCode::CREATED, Json(device)))
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Device>, AppError> {
    let key = DeviceKey::from_id(&id)?;
    Ok(Json(state.devices.get(&key).await?))
}

async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<Device>, AppError> {
    let update = validate::device_update(body(payload)?)?;
    let key = DeviceKey::from_id(&id)?;
    let device = state.devices.update(&key, update).await?;
    info!("Device updated: {} ({})", device.name, device.id);
    Ok(Json(device))
}

async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Device>, AppError> {
    let key = DeviceKey::from_id(&id)?;
    let device = state.devices.remove(&key).await?;
    info!("Device deleted: {} ({})", device.name, device.id);
    Ok(Json(device))
}

async fn wake_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let key = DeviceKey::from_id(&id)?;
    let report = orchestrator::wake_device(
        state.devices.as_ref(),
        state.activities.as_ref(),
        state.dispatcher.as_ref(),
        &key,
    )
    .await?;

    let mut response = json!({
        "status": "Magic packet sent",
        "device": report.device,
        "activity": report.activity,
    });
    if let Some(warning) = report.warning {
        response["warning"] = Value::String(warning);
    }
    Ok(Json(response))
}

async fn bulk_wake(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<WakeOutcome>>, AppError> {
    let ids = validate::bulk_ids(&body(payload)?)?;
    let outcomes = orchestrator::bulk_wake(
        state.devices.as_ref(),
        state.activities.as_ref(),
        state.dispatcher.as_ref(),
        &ids,
    )
    .await;
    Ok(Json(outcomes))
}

async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.devices.groups().await?))
}

async fn list_activities(
    State(state): State<AppState>,
    params: Result<Query<ActivityQuery>, QueryRejection>,
) -> Result<Json<Vec<ActivityRecord>>, AppError> {
    let filter = validate::activity_filter(query(params)?)?;
    Ok(Json(state.activities.query(&filter).await?))
}

async fn create_activity(
    State(state): State<AppState>,
    payload: Result<Json<ActivityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let new = validate::new_activity(body(payload)?)?;
    let activity = state.activities.record(new).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivityRecord>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| Error::ActivityNotFound)?;
    Ok(Json(state.activities.get(id).await?))
}

async fn delete_activities(
    State(state): State<AppState>,
    params: Result<Query<ActivityDeleteQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let device_id = validate::optional_device(query(params)?.device)?;
    let deleted = state.activities.delete_all(device_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn wake_mac(
    State(state): State<AppState>,
    payload: Result<Json<WakeRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let mac = validate::wake_mac(body(payload)?)?;
    state.dispatcher.send(&mac).await?;
    Ok(Json(json!({ "status": "Magic packet sent", "mac": mac })))
}

async fn legacy_add_device(
    State(state): State<AppState>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let new = validate::new_device(body(payload)?)?;
    let device = state.devices.add(new).await?;
    DEVICES_CREATED_TOTAL.inc();
    Ok(Json(json!({ "status": "Device added", "device": device })))
}

async fn legacy_update_device(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let update = validate::device_update(body(payload)?)?;
    let device = state.devices.update(&DeviceKey::Name(name), update).await?;
    Ok(Json(json!({ "status": "Device updated", "device": device })))
}

async fn legacy_delete_device(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let device = state.devices.remove(&DeviceKey::Name(name)).await?;
    Ok(Json(json!({ "status": "Device deleted", "device": device })))
}

pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::MissingField(_) | Error::InvalidField { .. } => StatusCode::BAD_REQUEST,
            Error::DuplicateName(_) => StatusCode::CONFLICT,
            Error::DeviceNotFound | Error::ActivityNotFound => StatusCode::NOT_FOUND,
            Error::Dispatch(_) | Error::Database(_) | Error::Migration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("API error: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
