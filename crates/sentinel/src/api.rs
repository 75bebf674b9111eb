//! HTTP API: health, metrics, ingestion, queries and configuration CRUD

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use sentinel_lib::{
    alerting::{ActiveAlert, AlertStatus, AlertThreshold},
    anomaly::{AnomalySummary, DetectionModelConfig, ModelUpdate},
    health::{ComponentStatus, HealthRegistry},
    observability::MonitorMetrics,
    significance::{ABTest, SignificanceResult},
    AnomalyRecord, DetectionOutcome, IngestReport, MetricSample, Monitor, MonitorError,
    MonitorStatus, PatternInsight,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>, metrics: MonitorMetrics) -> Self {
        Self {
            health_registry: monitor.health().clone(),
            monitor,
            metrics,
        }
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps monitor errors onto HTTP statuses
pub struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MonitorError::ThresholdNotFound(_)
            | MonitorError::AlertNotFound(_)
            | MonitorError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::InvalidTransition { .. } => StatusCode::CONFLICT,
            MonitorError::InvalidSample { .. }
            | MonitorError::OutOfOrderSample { .. }
            | MonitorError::InvalidThreshold { .. }
            | MonitorError::InvalidModel { .. }
            | MonitorError::InvalidExperiment(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    pub metric: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub status: Option<AlertStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnomalyList {
    pub anomalies: Vec<AnomalyRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InsightList {
    pub insights: Vec<PatternInsight>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertList {
    pub alerts: Vec<ActiveAlert>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdList {
    pub thresholds: Vec<AlertThreshold>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<DetectionModelConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub samples: Vec<MetricSample>,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let buffer = match state.metrics.encode_text() {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Json<MonitorStatus> {
    Json(state.monitor.status().await)
}

async fn ingest_metrics(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Json<IngestReport> {
    Json(state.monitor.ingest_batch(request.samples).await)
}

async fn list_anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnomalyQuery>,
) -> Json<AnomalyList> {
    let anomalies = state
        .monitor
        .anomalies(query.metric.as_deref(), query.limit)
        .await;
    Json(AnomalyList {
        total: anomalies.len(),
        anomalies,
    })
}

async fn anomaly_summary(State(state): State<Arc<AppState>>) -> Json<AnomalySummary> {
    Json(state.monitor.anomaly_summary().await)
}

async fn list_insights(State(state): State<Arc<AppState>>) -> Json<InsightList> {
    let insights = state.monitor.insights().await;
    Json(InsightList {
        total: insights.len(),
        insights,
    })
}

async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Json<AlertList> {
    let alerts = state.monitor.alerts(query.status).await;
    Json(AlertList {
        total: alerts.len(),
        alerts,
    })
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ActiveAlert> {
    Ok(Json(state.monitor.acknowledge_alert(&id, Utc::now()).await?))
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ActiveAlert> {
    Ok(Json(state.monitor.resolve_alert(&id, Utc::now()).await?))
}

async fn list_thresholds(State(state): State<Arc<AppState>>) -> Json<ThresholdList> {
    Json(ThresholdList {
        thresholds: state.monitor.thresholds().await,
    })
}

async fn put_threshold(
    State(state): State<Arc<AppState>>,
    Json(threshold): Json<AlertThreshold>,
) -> ApiResult<AlertThreshold> {
    Ok(Json(state.monitor.upsert_threshold(threshold).await?))
}

async fn delete_threshold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AlertThreshold> {
    Ok(Json(state.monitor.remove_threshold(&id).await?))
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelList {
        models: state.monitor.models().await,
    })
}

async fn patch_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ModelUpdate>,
) -> ApiResult<DetectionModelConfig> {
    Ok(Json(state.monitor.update_model(&id, update).await?))
}

async fn run_detection(State(state): State<Arc<AppState>>) -> Json<DetectionOutcome> {
    Json(state.monitor.run_detection_cycle(Utc::now()).await)
}

async fn experiment_significance(
    State(state): State<Arc<AppState>>,
    Json(test): Json<ABTest>,
) -> ApiResult<SignificanceResult> {
    Ok(Json(state.monitor.evaluate_experiment(&test)?))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/metrics", post(ingest_metrics))
        .route("/api/v1/anomalies", get(list_anomalies))
        .route("/api/v1/anomalies/summary", get(anomaly_summary))
        .route("/api/v1/insights", get(list_insights))
        .route("/api/v1/alerts", get(list_alerts))
        .route("/api/v1/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/api/v1/alerts/:id/resolve", post(resolve_alert))
        .route("/api/v1/thresholds", get(list_thresholds).put(put_threshold))
        .route("/api/v1/thresholds/:id", delete(delete_threshold))
        .route("/api/v1/models", get(list_models))
        .route("/api/v1/models/:id", patch(patch_model))
        .route("/api/v1/detection/run", post(run_detection))
        .route("/api/v1/experiments/significance", post(experiment_significance))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
