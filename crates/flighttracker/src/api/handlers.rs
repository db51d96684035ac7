//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::error::Error;
use crate::flight::FlightRecord;
use crate::scheduler::{Pipeline, PipelineStats, SchedulerError, SchedulerState};
use crate::store::{FlightStore, SearchQuery};

/// Error response: a status code and a JSON `{"message": ...}` body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_validation_error() {
            Self::new(StatusCode::BAD_REQUEST, err.to_string())
        } else {
            warn!("Request failed: {err}");
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                Self::new(StatusCode::FORBIDDEN, err.to_string())
            }
            SchedulerError::Setup(_) | SchedulerError::Join(_) => {
                warn!("Scheduler failure: {err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

/// Body of start and status responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Scheduler state after the request.
    pub state: SchedulerState,
}

/// Body of a stop response.
#[derive(Debug, Serialize)]
pub struct StopResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Counters of the run that was stopped.
    pub stats: PipelineStats,
}

/// Raw search parameters; validated by [`SearchQuery::from_params`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// `"lat,lon^lat,lon"`.
    pub bbox: Option<String>,
    /// Maximum altitude in feet.
    pub alt_threshold_feet: Option<String>,
    /// Window start, `YYYY-MM-DDTHH:MM:SS`.
    pub from_time_stamp: Option<String>,
    /// Window end, `YYYY-MM-DDTHH:MM:SS`.
    pub to_time_stamp: Option<String>,
}

/// Parameters echoed back in a search response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchEcho {
    /// The box as given.
    pub bbox: String,
    /// Maximum altitude in feet.
    #[serde(rename = "altThreshold")]
    pub alt_threshold: i64,
    /// Window start as given.
    #[serde(rename = "fromTimeStampParam")]
    pub from_time_stamp: String,
    /// Window end as given.
    #[serde(rename = "toTimeStampParam")]
    pub to_time_stamp: String,
}

/// Body of a search response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// The validated request.
    pub parameters: SearchEcho,
    /// Number of matching records.
    pub nb_flight: usize,
    /// Matching records.
    pub data: Vec<FlightRecord>,
}

/// GET /api/v1/start
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let config = state.config.clone();
    state
        .scheduler
        .start_with(move || async move { Pipeline::from_config(&config).await })
        .await?;

    info!("Pipeline started over HTTP");
    Ok((
        StatusCode::ACCEPTED,
        Json(StateResponse {
            message: "pipeline started".to_string(),
            state: state.scheduler.state(),
        }),
    )
        .into_response())
}

/// GET /api/v1/stop
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<StopResponse>, ApiError> {
    let stats = state.scheduler.stop().await?;
    info!(cycles = stats.cycles, "Pipeline stopped over HTTP");
    Ok(Json(StopResponse {
        message: "pipeline stopped".to_string(),
        stats,
    }))
}

/// GET /api/v1/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    let current = state.scheduler.state();
    Json(StateResponse {
        message: format!("pipeline {current}"),
        state: current,
    })
}

/// GET /api/v1/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = SearchQuery::from_params(
        params.bbox.as_deref(),
        params.alt_threshold_feet.as_deref(),
        params.from_time_stamp.as_deref(),
        params.to_time_stamp.as_deref(),
    )?;

    let parameters = SearchEcho {
        bbox: params.bbox.unwrap_or_default(),
        alt_threshold: query.alt_threshold_feet,
        from_time_stamp: params.from_time_stamp.unwrap_or_default(),
        to_time_stamp: params.to_time_stamp.unwrap_or_default(),
    };

    let path = state.config.database_path();
    let data = tokio::task::spawn_blocking(move || {
        let store = FlightStore::open(&path)?;
        store.search(&query)
    })
    .await
    .map_err(|e| Error::internal(format!("search task failed: {e}")))??;

    Ok(Json(SearchResponse {
        parameters,
        nb_flight: data.len(),
        data,
    }))
}
