//! # http
//!
//! why: expose the append log over the http routes existing clients already call
//! relations: wraps worklog-storage's LogService, mounted by lib.rs::run
//! what: router, handlers for save/load/csv/clear, ApiError mapping, static files

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, warn};
use worklog_core::LogEntry;
use worklog_storage::{LogError, LogService, LogStore};

const SAVE_FAILED: &str = "Error saving log entry.";
const LOAD_FAILED: &str = "Error loading log data.";
const CSV_FAILED: &str = "Error generating CSV.";
const CLEAR_FAILED: &str = "Error clearing log file.";

pub struct AppState<S> {
    service: Arc<LogService<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

/// a service call that failed, or never finished
enum CallError {
    Log(LogError),
    Aborted,
}

impl<S: LogStore + 'static> AppState<S> {
    /// run a blocking service call off the async executor
    ///
    /// lock backoff sleeps and file i/o happen on the blocking pool, so
    /// requests that don't need the lock are never stuck behind one that does.
    async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T, CallError>
    where
        T: Send + 'static,
        F: FnOnce(&LogService<S>) -> Result<T, LogError> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || f(&service)).await {
            Ok(result) => result.map_err(CallError::Log),
            Err(e) => {
                error!(op, error = %e, "log task aborted");
                Err(CallError::Aborted)
            }
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    InvalidEntry,
    NotFound,
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidEntry => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid log entry data received." })),
            )
                .into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Log file not found").into_response(),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

/// routes for the log api; anything else is looked up in `public_dir`
pub fn router<S: LogStore + 'static>(service: Arc<LogService<S>>, public_dir: &Path) -> Router {
    Router::new()
        .route("/save-log", post(save_log::<S>))
        .route("/load-log", get(load_log::<S>))
        .route("/log.csv", get(export_csv::<S>))
        .route("/clear-log", post(clear_log::<S>))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

async fn save_log<S: LogStore + 'static>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // malformed json is the client's fault, same as a missing timestamp
    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "save-log body is not json");
        ApiError::InvalidEntry
    })?;

    match state.call("save", move |svc| svc.append(value)).await {
        Ok(()) => Ok(Json(json!({ "message": "Log saved" }))),
        Err(CallError::Log(LogError::Validation(e))) => {
            warn!(error = %e, "rejected log entry");
            Err(ApiError::InvalidEntry)
        }
        Err(_) => Err(ApiError::Internal(SAVE_FAILED)),
    }
}

async fn load_log<S: LogStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    state
        .call("load", |svc| svc.list_all())
        .await
        .map(Json)
        .map_err(|e| {
            if let CallError::Log(e) = e {
                error!(error = %e, "error loading log");
            }
            ApiError::Internal(LOAD_FAILED)
        })
}

async fn export_csv<S: LogStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Response, ApiError> {
    match state.call("export", |svc| svc.export_csv()).await {
        Ok(csv) => Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"log.csv\""),
            ],
            csv,
        )
            .into_response()),
        Err(CallError::Log(LogError::NotInitialized)) => Err(ApiError::NotFound),
        Err(e) => {
            if let CallError::Log(e) = e {
                error!(error = %e, "error generating csv");
            }
            Err(ApiError::Internal(CSV_FAILED))
        }
    }
}

async fn clear_log<S: LogStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Value>, ApiError> {
    match state.call("clear", |svc| svc.clear()).await {
        Ok(()) => Ok(Json(json!({ "message": "Log cleared successfully." }))),
        Err(_) => Err(ApiError::Internal(CLEAR_FAILED)),
    }
}
