// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelioWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! HTTP surface of the HelioWatch service
//!
//! Authentication is handled by the surrounding deployment; the caller
//! identity arrives as an `X-User-Id` header. Every response uses the
//! `{ "success": bool, ... }` envelope with a human-readable `message`
//! on failure.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use heliowatch_core::{
    CoreError, DeviceRefresher, DeviceRegistry, DeviceStore, FaultOrchestrator,
    HistoryAggregator, NewDevice,
};

use crate::db::SqliteStore;

const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub devices: Arc<dyn DeviceStore>,
    pub registry: DeviceRegistry,
    pub refresher: DeviceRefresher,
    pub orchestrator: Arc<FaultOrchestrator>,
    pub history: HistoryAggregator,
}

type ApiResponse = (StatusCode, Json<Value>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/devices", post(add_device).get(list_devices))
        .route("/api/devices/refresh-all", post(refresh_all))
        .route(
            "/api/devices/{id}",
            get(get_device).patch(update_device).delete(delete_device),
        )
        .route("/api/devices/{id}/refresh", post(refresh_device))
        .route("/api/devices/{id}/detect", post(detect_fault))
        .route("/api/devices/{id}/history", get(day_history))
        .route("/api/devices/{id}/status", get(latest_status))
        .route("/api/devices/{id}/forecast", get(forecast))
        .with_state(state)
}

fn failure(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (
        status,
        Json(json!({ "success": false, "message": message.into() })),
    )
}

fn error_response(err: &CoreError) -> ApiResponse {
    let status = match err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "Internal error");
    }
    failure(status, err.to_string())
}

fn caller_id(headers: &HeaderMap) -> Result<String, ApiResponse> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "missing X-User-Id header"))
}

#[derive(Debug, Deserialize)]
pub struct AddDeviceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Calendar day filter, `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub hours_ahead: Option<u32>,
}

async fn health(State(state): State<AppState>) -> ApiResponse {
    match state.store.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "status": "ok" })),
        ),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, format!("database unreachable: {e}")),
    }
}

async fn add_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddDeviceRequest>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let new = NewDevice {
        user_id,
        name: request.name,
        api_url: request.api_url,
        serial: request.serial,
        token: request.token,
    };

    match state.registry.register(new).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Device added successfully",
                "device": result.device,
                "warning": result.warning,
            })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn list_devices(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.devices.list(&user_id).await {
        Ok(devices) => (
            StatusCode::OK,
            Json(json!({ "success": true, "count": devices.len(), "devices": devices })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn get_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.devices.get(&user_id, device_id).await {
        Ok(Some(device)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "device": device })),
        ),
        Ok(None) => failure(StatusCode::NOT_FOUND, "Device not found"),
        Err(err) => error_response(&err),
    }
}

async fn update_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
    Json(request): Json<UpdateDeviceRequest>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let mut device = match state.devices.get(&user_id, device_id).await {
        Ok(Some(device)) => device,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Device not found"),
        Err(err) => return error_response(&err),
    };

    if let Some(name) = request.name.filter(|value| !value.trim().is_empty()) {
        device.name = name;
    }
    if let Some(api_url) = request.api_url.filter(|value| !value.trim().is_empty()) {
        device.api_url = api_url;
    }
    if let Some(token) = request.token.filter(|value| !value.trim().is_empty()) {
        device.token = token;
    }
    device.updated_at = Utc::now();

    match state.devices.update(&device).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Device updated successfully",
                "device": device,
            })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn delete_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.devices.delete(&user_id, device_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Device deleted successfully" })),
        ),
        Ok(false) => failure(StatusCode::NOT_FOUND, "Device not found"),
        Err(err) => error_response(&err),
    }
}

async fn refresh_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let mut device = match state.devices.get(&user_id, device_id).await {
        Ok(Some(device)) => device,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Device not found"),
        Err(err) => return error_response(&err),
    };

    let outcome = state.refresher.refresh_if_stale(&mut device, Utc::now()).await;
    let message = if outcome.skipped {
        "Cached data is still fresh".to_owned()
    } else if outcome.success {
        "Device data refreshed successfully".to_owned()
    } else {
        format!(
            "Failed to refresh device data: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    };

    // Refresh failure is not terminal: the device row (now in error
    // status, stale data intact) is still returned to the caller.
    (
        StatusCode::OK,
        Json(json!({
            "success": outcome.success,
            "skipped": outcome.skipped,
            "message": message,
            "device": device,
        })),
    )
}

async fn refresh_all(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.refresher.refresh_all(&user_id, Utc::now()).await {
        Ok(results) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "All devices refreshed",
                "results": results,
            })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn detect_fault(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.orchestrator.detect(&user_id, device_id).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "fault_detection": outcome.prediction,
                "weather": outcome.weather,
                "timestamp": outcome.timestamp,
                "persisted": outcome.persisted,
            })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn day_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let device = match state.devices.get(&user_id, device_id).await {
        Ok(Some(device)) => device,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Device not found"),
        Err(err) => return error_response(&err),
    };

    match state.history.day_history(&user_id, &device, query.date).await {
        Ok(history) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": history.len(),
                "history": history,
            })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn latest_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.orchestrator.latest_status(&user_id, device_id).await {
        Ok(Some(status)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "has_history": true,
                "latest_fault": status,
            })),
        ),
        Ok(None) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "has_history": false,
                "message": "No fault history found",
            })),
        ),
        Err(err) => error_response(&err),
    }
}

async fn forecast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<i64>,
    Query(query): Query<ForecastQuery>,
) -> ApiResponse {
    let user_id = match caller_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let hours_ahead = query.hours_ahead.unwrap_or(24).clamp(1, 72);
    match state
        .orchestrator
        .forecast(&user_id, device_id, hours_ahead)
        .await
    {
        Ok(forecasts) => (
            StatusCode::OK,
            Json(json!({ "success": true, "forecasts": forecasts })),
        ),
        Err(err) => error_response(&err),
    }
}
