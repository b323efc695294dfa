use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{auth::CallerId, AppState};
use crate::{
    db::models::{Alert, GlucoseReading, NewReading, TargetRange},
    error::GlucoseError,
    glucose::{ChartBucket, GlucoseStats, Granularity},
};

type ApiResult<T> = Result<T, GlucoseError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub interval: Option<Granularity>,
}

#[derive(Debug, Deserialize)]
pub struct AlertParams {
    #[serde(default)]
    pub unacknowledged: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub readings: Vec<NewReading>,
}

#[derive(Serialize)]
pub struct ReadingsResponse {
    pub readings: Vec<GlucoseReading>,
}

#[derive(Serialize)]
pub struct ChartResponse {
    pub data: Vec<ChartBucket>,
}

#[derive(Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| GlucoseError::validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| GlucoseError::validation(rejection.body_text()))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /glucose
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    payload: Result<Json<NewReading>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GlucoseReading>)> {
    let reading = state.glucose.record_reading(&user_id, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// POST /glucose/batch
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReadingsResponse>)> {
    let request = body(payload)?;
    let readings = state.glucose.record_batch(&user_id, request.readings).await?;
    Ok((StatusCode::CREATED, Json(ReadingsResponse { readings })))
}

/// GET /glucose
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> ApiResult<Json<ReadingsResponse>> {
    let params = query(params)?;
    let (start, end) = state.glucose.resolve_window(params.start_date, params.end_date)?;
    let readings = state.glucose.list_readings(&user_id, start, end).await?;
    Ok(Json(ReadingsResponse { readings }))
}

/// GET /glucose/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> ApiResult<Json<GlucoseStats>> {
    let params = query(params)?;
    let (start, end) = state.glucose.resolve_window(params.start_date, params.end_date)?;
    Ok(Json(state.glucose.compute_stats(&user_id, start, end).await?))
}

/// GET /glucose/chart
pub async fn chart(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    params: Result<Query<ChartParams>, QueryRejection>,
) -> ApiResult<Json<ChartResponse>> {
    let params = query(params)?;
    let (start, end) = state.glucose.resolve_window(params.start_date, params.end_date)?;
    let data = state
        .glucose
        .chart_series(&user_id, start, end, params.interval.unwrap_or_default())
        .await?;
    Ok(Json(ChartResponse { data }))
}

/// DELETE /glucose/{id}
pub async fn delete_reading(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(reading_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.glucose.delete_reading(&user_id, &reading_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /glucose/alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    params: Result<Query<AlertParams>, QueryRejection>,
) -> ApiResult<Json<AlertsResponse>> {
    let params = query(params)?;
    let alerts = state
        .glucose
        .list_alerts(&user_id, params.unacknowledged)
        .await?;
    Ok(Json(AlertsResponse { alerts }))
}

/// POST /glucose/alerts/{id}/acknowledge
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(alert_id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.glucose.acknowledge_alert(&user_id, &alert_id).await?))
}

/// GET /glucose/target-range
pub async fn get_target_range(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> ApiResult<Json<TargetRange>> {
    Ok(Json(state.glucose.target_range(&user_id).await?))
}

/// PUT /glucose/target-range
pub async fn put_target_range(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    payload: Result<Json<TargetRange>, JsonRejection>,
) -> ApiResult<Json<TargetRange>> {
    let range = body(payload)?;
    Ok(Json(state.glucose.set_target_range(&user_id, range).await?))
}
