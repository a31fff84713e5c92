//! Wire DTOs for the REST API.
//!
//! All request and response shapes are camelCase JSON. Conversions from the
//! domain types live here so handlers stay thin.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use leaklens_core::{
    CoreError, CoreResult, DetectionStatus, ReadingSource, SensorKind, Severity, Timestamp,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{AnalysisReport, AnalyzedDetection};
use crate::domain::{LeakDetection, MatrixStats, Reading, Sensor};
use crate::import::ImportReport;
use crate::localization::{CandidateScore, LocalizationOutcome};
use crate::sensitivity::{BuildProgress, BuildState, BuildStatus};

/// Parses an RFC 3339 timestamp from a request field.
///
/// # Errors
///
/// `InvalidInput` naming the field when the value does not parse.
pub fn parse_timestamp(value: &str, field: &str) -> CoreResult<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| CoreError::invalid_input(format!("{field} is not a valid RFC 3339 timestamp")))
}

// ============================================================================
// Import
// ============================================================================

/// Response of `POST /api/network/import/epanet`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Always `"imported"` on success
    pub status: &'static str,
    /// Number of nodes created
    pub nodes_imported: usize,
    /// Number of links in the source file
    pub links_imported: usize,
    /// Number of DMAs created
    pub dmas_created: usize,
    /// Id of the created network
    pub network_id: Uuid,
}

impl From<ImportReport> for ImportResponse {
    fn from(report: ImportReport) -> Self {
        Self {
            status: "imported",
            nodes_imported: report.nodes_imported,
            links_imported: report.links_imported,
            dmas_created: report.dmas_created,
            network_id: *report.network_id.as_uuid(),
        }
    }
}

// ============================================================================
// Sensitivity matrix
// ============================================================================

/// Query of `POST /api/network/sensitivity-matrix/generate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMatrixQuery {
    /// Target network
    pub network_id: Uuid,
    /// Rebuild even when a matrix exists
    #[serde(default)]
    pub force: bool,
}

/// Query of `GET /api/network/sensitivity-matrix/status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixStatusQuery {
    /// Target network
    pub network_id: Uuid,
}

/// Build progress on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProgressDto {
    /// Candidates processed
    pub processed: usize,
    /// Total candidates
    pub total: usize,
    /// Whole-number percentage
    pub percentage: u8,
}

impl From<BuildProgress> for BuildProgressDto {
    fn from(p: BuildProgress) -> Self {
        Self {
            processed: p.processed,
            total: p.total,
            percentage: p.percentage,
        }
    }
}

/// Matrix statistics on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixStatsDto {
    /// Total persisted entries
    pub total_entries: usize,
    /// Candidates covered
    pub candidate_count: usize,
    /// Sensors covered
    pub sensor_count: usize,
    /// When the build finished
    pub generated_at: Timestamp,
}

impl From<MatrixStats> for MatrixStatsDto {
    fn from(stats: MatrixStats) -> Self {
        Self {
            total_entries: stats.total_entries,
            candidate_count: stats.candidate_count,
            sensor_count: stats.sensor_count,
            generated_at: stats.generated_at,
        }
    }
}

/// Build status on the wire, shared by generate and status endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatusResponse {
    /// `not_started`, `in_progress`, `completed`, or `error`
    pub state: BuildState,
    /// Progress while in progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<BuildProgressDto>,
    /// Statistics once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_stats: Option<MatrixStatsDto>,
    /// Failure description when errored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BuildStatus> for BuildStatusResponse {
    fn from(status: BuildStatus) -> Self {
        Self {
            state: status.state,
            progress: status.progress.map(Into::into),
            matrix_stats: status.stats.map(Into::into),
            error: status.error,
        }
    }
}

// ============================================================================
// Sensors
// ============================================================================

/// Body of `POST /api/sensors/auto-place`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPlaceRequest {
    /// Target network
    pub network_id: Uuid,
    /// Number of sensors to place (1..=1000, default 12)
    pub target_count: Option<usize>,
}

/// A sensor on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDto {
    /// Sensor id
    pub id: Uuid,
    /// Owning network
    pub network_id: Uuid,
    /// Sensor label
    pub sensor_id: String,
    /// Meter kind
    pub sensor_type: SensorKind,
    /// Host node id
    pub node_id: Uuid,
    /// DMA id, when assigned
    pub partition_id: Option<Uuid>,
    /// Whether the sensor is active
    pub is_active: bool,
}

impl From<Sensor> for SensorDto {
    fn from(sensor: Sensor) -> Self {
        Self {
            id: *sensor.id.as_uuid(),
            network_id: *sensor.network_id.as_uuid(),
            sensor_id: sensor.label,
            sensor_type: sensor.kind,
            node_id: *sensor.node_id.as_uuid(),
            partition_id: sensor.partition_id.map(|p| *p.as_uuid()),
            is_active: sensor.is_active,
        }
    }
}

/// Response of `POST /api/sensors/auto-place`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResponse {
    /// Number of sensors created
    pub count: usize,
    /// The created sensors
    pub sensors: Vec<SensorDto>,
}

// ============================================================================
// Readings
// ============================================================================

/// Body of `POST /api/readings`, and one element of a batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadingRequest {
    /// Target network
    pub network_id: Uuid,
    /// Sensor label
    pub sensor_id: String,
    /// Flow value in L/s
    pub flow_value: f64,
    /// RFC 3339 sample instant; defaults to now
    pub timestamp: Option<String>,
    /// Origin; defaults to `SENSOR`
    pub source: Option<ReadingSource>,
}

/// Body of `POST /api/readings/batch`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadingsRequest {
    /// The readings to store
    pub readings: Vec<CreateReadingRequest>,
}

/// A stored reading on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    /// Reading id
    pub id: Uuid,
    /// Owning network
    pub network_id: Uuid,
    /// Sensor id
    pub sensor_id: Uuid,
    /// Flow value in L/s
    pub flow_value: f64,
    /// Sample instant
    pub timestamp: Timestamp,
    /// Origin
    pub source: ReadingSource,
}

impl From<Reading> for ReadingDto {
    fn from(reading: Reading) -> Self {
        Self {
            id: *reading.id.as_uuid(),
            network_id: *reading.network_id.as_uuid(),
            sensor_id: *reading.sensor_id.as_uuid(),
            flow_value: reading.flow_lps,
            timestamp: reading.timestamp,
            source: reading.source,
        }
    }
}

/// Response of `POST /api/readings/batch`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadingsResponse {
    /// Number of readings stored
    pub count: usize,
    /// The stored readings
    pub readings: Vec<ReadingDto>,
}

// ============================================================================
// Detection
// ============================================================================

/// Body of `POST /api/leaks/detect`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    /// Target network
    pub network_id: Uuid,
    /// RFC 3339 analysis instant; defaults to now
    pub timestamp: Option<String>,
    /// Threshold in L/s; defaults to 5.0
    pub threshold: Option<f64>,
    /// Window in seconds; defaults to 300
    pub time_window: Option<i64>,
    /// Restrict to one node
    pub node_id: Option<Uuid>,
    /// Restrict to one DMA
    pub partition_id: Option<Uuid>,
}

/// A detection on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionDto {
    /// Detection id
    pub id: Uuid,
    /// Owning network
    pub network_id: Uuid,
    /// Node the imbalance was computed at
    pub node_id: Uuid,
    /// DMA scope, when DMA-scoped
    pub partition_id: Option<Uuid>,
    /// Imbalance in L/s
    pub flow_imbalance: f64,
    /// Severity bucket
    pub severity: Severity,
    /// Lifecycle state
    pub status: DetectionStatus,
    /// When the record was persisted
    pub detected_at: Timestamp,
    /// The analysis instant
    pub timestamp: Timestamp,
    /// Detection window in seconds
    pub time_window: Option<i64>,
    /// Threshold in L/s
    pub threshold: Option<f64>,
    /// Localized node, when localization ran
    pub localized_node_id: Option<Uuid>,
    /// Score of the localized node
    pub localization_score: Option<f64>,
    /// When localization ran
    pub localized_at: Option<Timestamp>,
}

impl From<LeakDetection> for DetectionDto {
    fn from(d: LeakDetection) -> Self {
        Self {
            id: *d.id.as_uuid(),
            network_id: *d.network_id.as_uuid(),
            node_id: *d.node_id.as_uuid(),
            partition_id: d.partition_id.map(|p| *p.as_uuid()),
            flow_imbalance: d.flow_imbalance,
            severity: d.severity(),
            status: d.status(),
            detected_at: d.detected_at,
            timestamp: d.timestamp,
            time_window: d.time_window_secs,
            threshold: d.threshold_lps,
            localized_node_id: d.localized_node_id.map(|n| *n.as_uuid()),
            localization_score: d.localization_score,
            localized_at: d.localized_at,
        }
    }
}

// ============================================================================
// Localization
// ============================================================================

/// Body of `POST /api/leaks/localize`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizeRequest {
    /// A single detection to localize
    pub detection_id: Option<Uuid>,
    /// Several detections to localize
    pub detection_ids: Option<Vec<Uuid>>,
    /// Baseline window in seconds; defaults to 3600
    pub baseline_time_window: Option<i64>,
}

impl LocalizeRequest {
    /// The union of `detectionId` and `detectionIds`.
    #[must_use]
    pub fn all_detection_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.detection_id.into_iter().collect();
        if let Some(more) = &self.detection_ids {
            ids.extend(more.iter().copied());
        }
        ids
    }
}

/// One ranked candidate on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDto {
    /// Candidate node id
    pub node_id: Uuid,
    /// Candidate node label
    pub label: String,
    /// Candidate score
    pub score: f64,
}

impl From<CandidateScore> for CandidateDto {
    fn from(c: CandidateScore) -> Self {
        Self {
            node_id: *c.node_id.as_uuid(),
            label: c.label,
            score: c.score,
        }
    }
}

/// A localization result on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationDto {
    /// The localized detection
    pub detection_id: Uuid,
    /// Owning network
    pub network_id: Uuid,
    /// Most likely leak node
    pub localized_node_id: Uuid,
    /// Label of the most likely leak node
    pub localized_node_label: String,
    /// Winning score
    pub localization_score: f64,
    /// Ranked top candidates
    pub top_candidates: Vec<CandidateDto>,
    /// When localization ran
    pub localized_at: Timestamp,
}

impl From<LocalizationOutcome> for LocalizationDto {
    fn from(o: LocalizationOutcome) -> Self {
        Self {
            detection_id: *o.detection_id.as_uuid(),
            network_id: *o.network_id.as_uuid(),
            localized_node_id: *o.node_id.as_uuid(),
            localized_node_label: o.label,
            localization_score: o.score,
            top_candidates: o.top_candidates.into_iter().map(Into::into).collect(),
            localized_at: o.localized_at,
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// One reading in an analyze request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeReadingDto {
    /// Sensor label
    pub sensor_id: String,
    /// Flow value in L/s
    pub flow_value: f64,
}

/// Body of `POST /api/leaks/analyze`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Target network
    pub network_id: Uuid,
    /// RFC 3339 analysis instant
    pub timestamp: String,
    /// Simultaneous readings
    pub readings: Vec<AnalyzeReadingDto>,
}

/// A detection with its localization, on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDetectionDto {
    /// The detection
    #[serde(flatten)]
    pub detection: DetectionDto,
    /// Localization result, when one succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localization: Option<LocalizationDto>,
}

impl From<AnalyzedDetection> for AnalyzedDetectionDto {
    fn from(a: AnalyzedDetection) -> Self {
        Self {
            detection: a.detection.into(),
            localization: a.localization.map(Into::into),
        }
    }
}

/// Aggregate counts on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummaryDto {
    /// Total detections
    pub total: usize,
    /// Localized detections
    pub localized: usize,
    /// Detections per severity
    pub severity_breakdown: BTreeMap<Severity, usize>,
}

/// Response of `POST /api/leaks/analyze`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReportDto {
    /// The analysis instant
    pub timestamp: Timestamp,
    /// Number of readings stored
    pub readings_stored: usize,
    /// Detections with optional localizations
    pub detections: Vec<AnalyzedDetectionDto>,
    /// Aggregate counts
    pub summary: AnalysisSummaryDto,
}

impl From<AnalysisReport> for AnalysisReportDto {
    fn from(report: AnalysisReport) -> Self {
        Self {
            timestamp: report.timestamp,
            readings_stored: report.readings_stored,
            detections: report.detections.into_iter().map(Into::into).collect(),
            summary: AnalysisSummaryDto {
                total: report.summary.total,
                localized: report.summary.localized,
                severity_breakdown: report.summary.severity_breakdown,
            },
        }
    }
}
