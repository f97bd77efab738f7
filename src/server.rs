//! HTTP binding of the ingestion contract.
use crate::ingest::{Applied, IngestError, Ingestor};
use crate::model::{ChangeOp, PushEvent};
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
}

/// Error type for hook responses.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Ingest(IngestError),
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::Ingest(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Ingest(err) => {
                let status = match &err {
                    IngestError::Parse(_) => StatusCode::BAD_REQUEST,
                    IngestError::ProtectedKey(_) => StatusCode::FORBIDDEN,
                    IngestError::NotFound(_) => StatusCode::NOT_FOUND,
                    IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };
        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(healthcheck))
        .route("/hook", post(create_hook))
        .route("/delete", post(delete_hook))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    info!(addr = %listener.local_addr()?, "hook server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn healthcheck() -> &'static str {
    "Healthy!"
}

async fn create_hook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Applied>, AppError> {
    handle(&state, &body, ChangeOp::Create).await
}

async fn delete_hook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Applied>, AppError> {
    handle(&state, &body, ChangeOp::Delete).await
}

async fn handle(state: &AppState, body: &[u8], op: ChangeOp) -> Result<Json<Applied>, AppError> {
    let event: PushEvent = serde_json::from_slice(body).map_err(|err| {
        warn!(%err, "failed to parse hook payload");
        AppError::BadRequest(format!("invalid hook payload: {}", err))
    })?;
    match state.ingestor.apply_change(&event, op).await {
        Ok(applied) => Ok(Json(applied)),
        Err(err) => {
            warn!(op = op.as_str(), %err, "hook rejected");
            Err(err.into())
        }
    }
}
