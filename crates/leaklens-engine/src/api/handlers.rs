//! Axum request handlers.
//!
//! Handlers stay thin: extract, delegate to a service, convert to a DTO.
//! Every error is a [`ApiError`] carrying the request path for the standard
//! error body.

use axum::{
    extract::{Multipart, OriginalUri, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use leaklens_core::{
    CoreError, DetectionId, NetworkId, NodeId, PartitionId, ReadingSource, Timestamp,
};

use crate::analysis::IncomingReading;
use crate::detection::DetectionRequest;
use crate::domain::Reading;
use crate::placement::DEFAULT_TARGET_COUNT;
use super::dto::*;
use super::error::{ApiError, ApiResult};
use super::state::AppState;

fn at(uri: &OriginalUri) -> String {
    uri.path().to_string()
}

fn wrap<T>(result: Result<T, CoreError>, uri: &OriginalUri) -> ApiResult<T> {
    result.map_err(|err| ApiError::from(err).at(at(uri)))
}

// ============================================================================
// Network import
// ============================================================================

/// `POST /api/network/import/epanet` — multipart `.inp` upload.
///
/// Expects a `file` part with the model text and an optional `name` part
/// with the network display name.
#[tracing::instrument(skip(state, multipart))]
pub async fn import_epanet(
    State(state): State<AppState>,
    uri: OriginalUri,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImportResponse>)> {
    let mut file: Option<Vec<u8>> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::from(CoreError::invalid_input(format!("bad multipart body: {err}"))).at(at(&uri))
    })? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::from(CoreError::invalid_input(format!(
                        "failed to read upload: {err}"
                    )))
                    .at(at(&uri))
                })?;
                file = Some(bytes.to_vec());
            }
            Some("name") => {
                name = field.text().await.ok().filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| {
        ApiError::from(CoreError::invalid_input("missing 'file' part in upload")).at(at(&uri))
    })?;

    let report = wrap(state.import().import_inp(name, &bytes).await, &uri)?;
    Ok((StatusCode::CREATED, Json(report.into())))
}

// ============================================================================
// Sensitivity matrix
// ============================================================================

/// `POST /api/network/sensitivity-matrix/generate`
#[tracing::instrument(skip(state))]
pub async fn generate_matrix(
    State(state): State<AppState>,
    uri: OriginalUri,
    Query(query): Query<GenerateMatrixQuery>,
) -> ApiResult<Json<BuildStatusResponse>> {
    let network = NetworkId::from_uuid(query.network_id);
    let status = wrap(state.matrix().generate(network, query.force).await, &uri)?;
    Ok(Json(status.into()))
}

/// `GET /api/network/sensitivity-matrix/status`
#[tracing::instrument(skip(state))]
pub async fn matrix_status(
    State(state): State<AppState>,
    uri: OriginalUri,
    Query(query): Query<MatrixStatusQuery>,
) -> ApiResult<Json<BuildStatusResponse>> {
    let network = NetworkId::from_uuid(query.network_id);
    let status = wrap(state.matrix().status(network).await, &uri)?;
    Ok(Json(status.into()))
}

// ============================================================================
// Sensors
// ============================================================================

/// `POST /api/sensors/auto-place`
#[tracing::instrument(skip(state))]
pub async fn auto_place_sensors(
    State(state): State<AppState>,
    uri: OriginalUri,
    Json(request): Json<AutoPlaceRequest>,
) -> ApiResult<(StatusCode, Json<PlacementResponse>)> {
    let network = NetworkId::from_uuid(request.network_id);
    let target = request.target_count.unwrap_or(DEFAULT_TARGET_COUNT);
    let sensors = wrap(state.placement().auto_place(network, target).await, &uri)?;
    Ok((
        StatusCode::CREATED,
        Json(PlacementResponse {
            count: sensors.len(),
            sensors: sensors.into_iter().map(Into::into).collect(),
        }),
    ))
}

// ============================================================================
// Readings
// ============================================================================

async fn build_reading(
    state: &AppState,
    request: &CreateReadingRequest,
) -> Result<Reading, CoreError> {
    let network = NetworkId::from_uuid(request.network_id);
    let sensor = state
        .stores()
        .sensors
        .by_label(network, &request.sensor_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Sensor", request.sensor_id.clone()))?;

    let timestamp: Timestamp = match &request.timestamp {
        Some(raw) => parse_timestamp(raw, "timestamp")?,
        None => Utc::now(),
    };

    Ok(Reading::new(
        network,
        sensor.id,
        request.flow_value,
        timestamp,
        request.source.unwrap_or(ReadingSource::Sensor),
    ))
}

/// `POST /api/readings` — store a single reading.
#[tracing::instrument(skip(state, request))]
pub async fn create_reading(
    State(state): State<AppState>,
    uri: OriginalUri,
    Json(request): Json<CreateReadingRequest>,
) -> ApiResult<(StatusCode, Json<ReadingDto>)> {
    let reading = wrap(build_reading(&state, &request).await, &uri)?;
    let dto: ReadingDto = reading.clone().into();
    wrap(
        state.stores().readings.insert_many(vec![reading]).await,
        &uri,
    )?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `POST /api/readings/batch` — store a batch of readings.
#[tracing::instrument(skip(state, request))]
pub async fn create_readings_batch(
    State(state): State<AppState>,
    uri: OriginalUri,
    Json(request): Json<BatchReadingsRequest>,
) -> ApiResult<(StatusCode, Json<BatchReadingsResponse>)> {
    if request.readings.is_empty() {
        return Err(ApiError::from(CoreError::invalid_input("readings batch is empty")).at(at(&uri)));
    }

    let mut readings = Vec::with_capacity(request.readings.len());
    for item in &request.readings {
        readings.push(wrap(build_reading(&state, item).await, &uri)?);
    }

    let dtos: Vec<ReadingDto> = readings.iter().cloned().map(Into::into).collect();
    let count = wrap(state.stores().readings.insert_many(readings).await, &uri)?;
    Ok((
        StatusCode::CREATED,
        Json(BatchReadingsResponse {
            count,
            readings: dtos,
        }),
    ))
}

// ============================================================================
// Leaks
// ============================================================================

/// `POST /api/leaks/detect`
#[tracing::instrument(skip(state, request))]
pub async fn detect_leaks(
    State(state): State<AppState>,
    uri: OriginalUri,
    Json(request): Json<DetectRequest>,
) -> ApiResult<Json<Vec<DetectionDto>>> {
    let network = NetworkId::from_uuid(request.network_id);
    let timestamp = match &request.timestamp {
        Some(raw) => wrap(parse_timestamp(raw, "timestamp"), &uri)?,
        None => Utc::now(),
    };

    let mut detection_request = DetectionRequest::new(network, timestamp);
    if let Some(threshold) = request.threshold {
        detection_request = detection_request.with_threshold(threshold);
    }
    if let Some(window) = request.time_window {
        detection_request = detection_request.with_window(window);
    }
    if let Some(node) = request.node_id {
        detection_request = detection_request.with_node(NodeId::from_uuid(node));
    }
    if let Some(partition) = request.partition_id {
        detection_request = detection_request.with_partition(PartitionId::from_uuid(partition));
    }

    let detections = wrap(state.detector().detect(&detection_request).await, &uri)?;
    Ok(Json(detections.into_iter().map(Into::into).collect()))
}

/// `POST /api/leaks/localize`
#[tracing::instrument(skip(state, request))]
pub async fn localize_leaks(
    State(state): State<AppState>,
    uri: OriginalUri,
    Json(request): Json<LocalizeRequest>,
) -> ApiResult<Json<Vec<LocalizationDto>>> {
    let ids = request.all_detection_ids();
    if ids.is_empty() {
        return Err(ApiError::from(CoreError::invalid_input(
            "provide detectionId or detectionIds",
        ))
        .at(at(&uri)));
    }
    let baseline = request
        .baseline_time_window
        .unwrap_or(leaklens_core::DEFAULT_BASELINE_WINDOW_SECS);

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let outcome = wrap(
            state
                .localizer()
                .localize(DetectionId::from_uuid(id), baseline)
                .await,
            &uri,
        )?;
        results.push(outcome.into());
    }
    Ok(Json(results))
}

/// `POST /api/leaks/analyze` — one-shot detect and localize.
#[tracing::instrument(skip(state, request))]
pub async fn analyze(
    State(state): State<AppState>,
    uri: OriginalUri,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisReportDto>> {
    let network = NetworkId::from_uuid(request.network_id);
    let timestamp = wrap(parse_timestamp(&request.timestamp, "timestamp"), &uri)?;
    let readings: Vec<IncomingReading> = request
        .readings
        .into_iter()
        .map(|r| IncomingReading {
            sensor_label: r.sensor_id,
            flow_lps: r.flow_value,
        })
        .collect();

    let report = wrap(
        state.orchestrator().analyze(network, timestamp, readings).await,
        &uri,
    )?;
    Ok(Json(report.into()))
}
