//! REST API for the leaklens engine.
//!
//! JSON over HTTP, all routes prefixed `/api`:
//!
//! - `POST /api/network/import/epanet` — multipart `.inp` upload, creates
//!   the topology and its DMAs
//! - `POST /api/network/sensitivity-matrix/generate` — start or reuse a
//!   matrix build (`networkId`, `force` query parameters)
//! - `GET  /api/network/sensitivity-matrix/status` — poll a build
//! - `POST /api/sensors/auto-place` — greedy deterministic placement
//! - `POST /api/readings` / `POST /api/readings/batch` — store samples
//! - `POST /api/leaks/detect` — run mass-balance detection
//! - `POST /api/leaks/localize` — localize persisted detections
//! - `POST /api/leaks/analyze` — one-shot detect and localize
//!
//! Errors use the standard body
//! `{statusCode, timestamp, path, message, error}`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Builds the API router over the given state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/network/import/epanet", post(handlers::import_epanet))
        .route(
            "/api/network/sensitivity-matrix/generate",
            post(handlers::generate_matrix),
        )
        .route(
            "/api/network/sensitivity-matrix/status",
            get(handlers::matrix_status),
        )
        .route("/api/sensors/auto-place", post(handlers::auto_place_sensors))
        .route("/api/readings", post(handlers::create_reading))
        .route("/api/readings/batch", post(handlers::create_readings_batch))
        .route("/api/leaks/detect", post(handlers::detect_leaks))
        .route("/api/leaks/localize", post(handlers::localize_leaks))
        .route("/api/leaks/analyze", post(handlers::analyze))
        .with_state(state)
}
