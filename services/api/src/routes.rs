use crate::infra::{AppState, CollaboratorError, InMemoryCollaborator};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use placement_pipeline::workflows::pipeline::{
    registry, ApiScope, Application, ApplicationId, JobId, StageDescriptor, StatusPatch,
};
use serde_json::json;

/// Collaborator REST contract, served from memory.
pub(crate) fn collaborator_router(collaborator: InMemoryCollaborator) -> Router {
    Router::new()
        .route("/api/stages", get(stage_registry))
        .route(
            "/api/:scope/job/:job_id/applications",
            get(list_applications),
        )
        .route(
            "/api/:scope/application/:application_id/status",
            put(update_status),
        )
        .with_state(collaborator)
}

pub(crate) fn with_service_routes(collaborator: InMemoryCollaborator) -> Router {
    collaborator_router(collaborator)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

impl IntoResponse for CollaboratorError {
    fn into_response(self) -> Response {
        let status = match self {
            CollaboratorError::UnknownApplication(_) => StatusCode::NOT_FOUND,
            CollaboratorError::InvalidPatch(_) => StatusCode::BAD_REQUEST,
            CollaboratorError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

fn known_scope(raw: &str) -> Result<ApiScope, Response> {
    ApiScope::parse(raw).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("unknown scope '{raw}'") })),
        )
            .into_response()
    })
}

pub(crate) async fn stage_registry() -> Json<[StageDescriptor; 5]> {
    Json(registry())
}

pub(crate) async fn list_applications(
    State(collaborator): State<InMemoryCollaborator>,
    Path((scope, job_id)): Path<(String, u64)>,
) -> Result<Json<Vec<Application>>, Response> {
    known_scope(&scope)?;
    Ok(Json(collaborator.applications(JobId(job_id))))
}

pub(crate) async fn update_status(
    State(collaborator): State<InMemoryCollaborator>,
    Path((scope, application_id)): Path<(String, u64)>,
    Json(patch): Json<StatusPatch>,
) -> Result<Json<serde_json::Value>, Response> {
    known_scope(&scope)?;
    let updated = collaborator
        .update_status(ApplicationId(application_id), &patch)
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({ "success": true, "application": updated })))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
