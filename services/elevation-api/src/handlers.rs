//! HTTP handlers.
//!
//! Elevations are meters above sea level. Points the dataset has no value
//! for (sea, outside coverage) come back as JSON `null` rather than NaN,
//! which JSON cannot represent.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use dem_common::DemError;

use crate::state::AppState;

/// Cap on points per batch request.
const MAX_BATCH_POINTS: usize = 1000;

pub enum ApiError {
    BadRequest(String),
    Internal(DemError),
}

impl From<DemError> for ApiError {
    fn from(err: DemError) -> Self {
        match err {
            DemError::Projection(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "elevation query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Deserialize)]
pub struct PositionParams {
    /// WGS 84 longitude in degrees.
    pub lon: f64,
    /// WGS 84 latitude in degrees.
    pub lat: f64,
}

#[derive(Serialize)]
pub struct ElevationResponse {
    pub lon: f64,
    pub lat: f64,
    pub elevation: Option<f64>,
}

/// GET /elevation?lon=..&lat=..
pub async fn elevation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PositionParams>,
) -> Result<Json<ElevationResponse>, ApiError> {
    let elevation = state.service.elevation_wgs84(params.lon, params.lat).await?;
    Ok(Json(ElevationResponse {
        lon: params.lon,
        lat: params.lat,
        elevation: nan_to_null(elevation),
    }))
}

#[derive(Deserialize)]
pub struct BatchRequest {
    /// `[longitude, latitude]` pairs in degrees.
    pub points: Vec<(f64, f64)>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    /// One entry per input point, in input order.
    pub elevations: Vec<Option<f64>>,
}

/// POST /elevation with a JSON body of points.
pub async fn elevation_batch_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    if request.points.len() > MAX_BATCH_POINTS {
        return Err(ApiError::BadRequest(format!(
            "{} points exceeds the limit of {MAX_BATCH_POINTS}",
            request.points.len()
        )));
    }

    let elevations = state.service.elevations_wgs84(&request.points).await?;
    Ok(Json(BatchResponse {
        elevations: elevations.into_iter().map(nan_to_null).collect(),
    }))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub open_decoders: usize,
    pub decoder_cache_hits: u64,
    pub decoder_cache_misses: u64,
    pub missing_files: u64,
    pub decoder_evictions: u64,
    pub hit_rate: f64,
}

/// GET /stats - decoder cache counters.
pub async fn stats_handler(Extension(state): Extension<Arc<AppState>>) -> Json<StatsResponse> {
    let tile_set = state.service.tile_set();
    let stats = tile_set.cache_stats();
    Json(StatsResponse {
        open_decoders: tile_set.open_decoders().await,
        decoder_cache_hits: stats.hits(),
        decoder_cache_misses: stats.misses(),
        missing_files: stats.absent_recorded(),
        decoder_evictions: stats.evictions(),
        hit_rate: stats.hit_rate(),
    })
}

fn nan_to_null(elevation: f64) -> Option<f64> {
    if elevation.is_nan() {
        None
    } else {
        Some(elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::ElevationConfig;
    use test_utils::GeoTiffBuilder;

    /// One flat 100 m file covering the projected location of 50°N 5°E,
    /// which maps to roughly (3962799, 2999719) in EPSG:3035 and therefore
    /// to the file `eu_dem_v11_E30N20.TIF`.
    fn test_router(dir: &std::path::Path) -> axum::Router {
        GeoTiffBuilder::new(16, 16, 16, 16)
            .with_samples(vec![100.0; 16 * 16])
            .with_origin(3_962_600, 2_999_900)
            .write_to(&dir.join("eu_dem_v11_E30N20.TIF"))
            .unwrap();

        let state = AppState::new(&ElevationConfig {
            dem_path: dir.to_path_buf(),
            decoder_cache_size: 4,
            tile_cache_mb: 16,
            canary: Some("eu_dem_v11_E30N20.TIF".to_string()),
        })
        .unwrap();
        crate::build_router(Arc::new(state))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn single_point_query_returns_an_elevation() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let response = router
            .oneshot(
                Request::get("/elevation?lon=5.0&lat=50.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let elevation = body["elevation"].as_f64().unwrap();
        assert!((elevation - 100.0).abs() < 1e-9, "elevation {elevation}");
    }

    #[tokio::test]
    async fn uncovered_points_are_null() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let response = router
            .oneshot(
                Request::get("/elevation?lon=5.0&lat=51.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["elevation"].is_null());
    }

    #[tokio::test]
    async fn unprojectable_points_are_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let response = router
            .oneshot(
                Request::get("/elevation?lon=5.0&lat=95.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn batch_queries_preserve_order_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let body = serde_json::json!({ "points": [[5.0, 50.0], [5.0, 51.0], [5.0, 50.0]] });
        let response = router
            .oneshot(
                Request::post("/elevation")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let elevations = body["elevations"].as_array().unwrap();
        assert_eq!(elevations.len(), 3);
        assert!((elevations[0].as_f64().unwrap() - 100.0).abs() < 1e-9);
        assert!(elevations[1].is_null());
        assert!((elevations[2].as_f64().unwrap() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn oversized_batches_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let points: Vec<[f64; 2]> = vec![[5.0, 50.0]; MAX_BATCH_POINTS + 1];
        let body = serde_json::json!({ "points": points });
        let response = router
            .oneshot(
                Request::post("/elevation")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stats_reflect_decoder_activity() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(dir.path());

        let response = router
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["open_decoders"].as_u64().is_some());
    }
}
