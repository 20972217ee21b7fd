//! HTTP API for the rotation engine
//!
//! Endpoints:
//! - POST /session - Ingest a finalized session snapshot
//! - GET /session/{id}/mood - Mood timeline payload
//! - GET /session/{id}/synergy?user={uid} - Synergy payload
//! - GET /session/{id}/insights?user={uid} - Legacy deep-insights payload
//! - GET /session/{id}/rotation/{surface}?user={uid} - Viewer rotation pack
//! - POST /user/{id}/premium - Set premium status
//! - GET /health - Health check

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::rotation::RotationEngine;
use crate::core::store::DocumentStore;
use crate::types::{
    DeepInsightsPayload, EngineError, MoodTimelinePayload, RotationPack, SessionSnapshot, Surface,
    SynergyPayload,
};

/// App state
pub struct AppState<S: DocumentStore> {
    pub engine: RotationEngine<S>,
}

/// Error payload returned with non-2xx statuses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Ingest response
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub session_id: String,
    pub user_id: String,
    pub messages: usize,
}

/// Viewer identity carried on read endpoints
#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub user: String,
}

/// Set premium request
#[derive(Debug, Serialize, Deserialize)]
pub struct PremiumRequest {
    pub premium: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_precondition() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            code: e.code().to_string(),
            message: e.to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router<S: DocumentStore + 'static>(engine: RotationEngine<S>) -> Router {
    let state = Arc::new(AppState { engine });

    Router::new()
        .route("/health", get(health))
        .route("/session", post(ingest_session))
        .route("/session/:id/mood", get(get_mood))
        .route("/session/:id/synergy", get(get_synergy))
        .route("/session/:id/insights", get(get_deep_insights))
        .route("/session/:id/rotation/:surface", get(get_rotation))
        .route("/user/:id/premium", post(set_premium))
        .with_state(state)
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// Ingest a finalized session
async fn ingest_session<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(session): Json<SessionSnapshot>,
) -> Result<Json<IngestResponse>, ApiError> {
    state.engine.ingest_session(&session).map_err(reject)?;
    Ok(Json(IngestResponse {
        session_id: session.session_id,
        user_id: session.user_id,
        messages: session.messages.len(),
    }))
}

/// Mood timeline for a session
async fn get_mood<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<MoodTimelinePayload>, ApiError> {
    state.engine.mood_timeline(&id).map(Json).map_err(reject)
}

/// Synergy payload for a session
async fn get_synergy<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(viewer): Query<ViewerQuery>,
) -> Result<Json<SynergyPayload>, ApiError> {
    state
        .engine
        .synergy_payload(&viewer.user, &id)
        .map(Json)
        .map_err(reject)
}

/// Legacy deep-insights payload
async fn get_deep_insights<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(viewer): Query<ViewerQuery>,
) -> Result<Json<DeepInsightsPayload>, ApiError> {
    state
        .engine
        .deep_insights(&viewer.user, &id)
        .map(Json)
        .map_err(reject)
}

/// Viewer-specific rotation pack for a (session, surface) pair.
/// Infrastructure failures degrade to a well-formed empty pack; only
/// precondition violations surface as errors.
async fn get_rotation<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, surface)): Path<(String, String)>,
    Query(viewer): Query<ViewerQuery>,
) -> Result<Json<RotationPack>, ApiError> {
    let surface = Surface::from(surface);
    match state.engine.rotation_pack(&viewer.user, &id, &surface) {
        Ok(pack) => Ok(Json(pack)),
        Err(e) if e.is_precondition() || matches!(e, EngineError::SessionNotFound { .. }) => {
            Err(reject(e))
        }
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "rotation read degraded to empty pack");
            Ok(Json(RotationPack {
                version: crate::PAYLOAD_VERSION,
                session_id: id,
                surface,
                ..Default::default()
            }))
        }
    }
}

/// Set a user's premium status
async fn set_premium<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<PremiumRequest>,
) -> Result<Json<PremiumRequest>, ApiError> {
    state
        .engine
        .store()
        .set_premium(&id, req.premium)
        .map_err(reject)?;
    Ok(Json(req))
}

/// Run the API server
pub async fn run_server<S: DocumentStore + 'static>(
    addr: &str,
    engine: RotationEngine<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("cadence API running on {}", addr);
    println!("  POST /session                        - Ingest session");
    println!("  GET  /session/:id/mood               - Mood timeline");
    println!("  GET  /session/:id/synergy?user=U     - Synergy payload");
    println!("  GET  /session/:id/insights?user=U    - Deep insights");
    println!("  GET  /session/:id/rotation/:surface  - Rotation pack (?user=U)");
    println!("  POST /user/:id/premium               - Set premium");
    println!("  GET  /health                         - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
