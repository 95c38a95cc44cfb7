use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::types::{
    AddRequest, AddResponse, AppState, CheckRequest, CheckResponse,
    ErrorResponse, InfoResponse, UnionResponse,
};
use crate::error::FilterError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        add_elems,
        check_elems,
        union_filter,
        snapshot,
        info,
    ),
    components(
        schemas(
            AddRequest,
            AddResponse,
            CheckRequest,
            CheckResponse,
            UnionResponse,
            InfoResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "rotating-bloom", description = "Rotating Bloom Filter API")
    )
)]
struct ApiDoc;

fn error_response(err: FilterError) -> Response {
    let status = match &err {
        FilterError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        FilterError::IncompatibleType { .. }
        | FilterError::ConfigMismatch(_)
        | FilterError::HashIncompatible
        | FilterError::DecodeError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// Check API health
#[utoipa::path(
    get,
    path = "/health",
    tag = "rotating-bloom",
    responses(
        (status = 200, description = "API is healthy")
    )
)]
async fn health_check() -> impl IntoResponse {
    debug!("Health check");
    StatusCode::OK
}

/// Add a batch of elements
#[utoipa::path(
    post,
    path = "/add",
    tag = "rotating-bloom",
    request_body = AddRequest,
    responses(
        (status = 200, description = "Elements added", body = AddResponse),
        (status = 503, description = "Filter not initialized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn add_elems(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddRequest>,
) -> Response {
    debug!("Adding {} elements", request.elems.len());
    let elems: Vec<&[u8]> =
        request.elems.iter().map(|elem| elem.as_bytes()).collect();
    match state.registry.add(&elems) {
        Ok(count) => Json(AddResponse { count }).into_response(),
        Err(e) => error_response(e),
    }
}

/// Check a batch of elements
#[utoipa::path(
    post,
    path = "/check",
    tag = "rotating-bloom",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Check results in request order", body = CheckResponse),
        (status = 503, description = "Filter not initialized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn check_elems(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckRequest>,
) -> Response {
    debug!("Checking {} elements", request.elems.len());
    let elems: Vec<&[u8]> =
        request.elems.iter().map(|elem| elem.as_bytes()).collect();
    match state.registry.check(&elems) {
        Ok(checks) => Json(CheckResponse { checks }).into_response(),
        Err(e) => error_response(e),
    }
}

/// Merge a serialized rotating filter into the served one
#[utoipa::path(
    post,
    path = "/union",
    tag = "rotating-bloom",
    request_body(
        content = Vec<u8>,
        description = "Snapshot of a rotating filter",
        content_type = "application/octet-stream"
    ),
    responses(
        (status = 200, description = "Union applied", body = UnionResponse),
        (status = 400, description = "Incompatible or malformed filter", body = ErrorResponse),
        (status = 503, description = "Filter not initialized", body = ErrorResponse)
    )
)]
async fn union_filter(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    debug!("Union with {} byte snapshot", body.len());
    match state.registry.union(&body) {
        Ok(capacity) => Json(UnionResponse { capacity }).into_response(),
        Err(e) => error_response(e),
    }
}

/// Download a snapshot of the served filter
#[utoipa::path(
    get,
    path = "/snapshot",
    tag = "rotating-bloom",
    responses(
        (status = 200, description = "LZ4 compressed snapshot", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 503, description = "Filter not initialized", body = ErrorResponse)
    )
)]
async fn snapshot(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.snapshot() {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Describe the served filter
#[utoipa::path(
    get,
    path = "/info",
    tag = "rotating-bloom",
    responses(
        (status = 200, description = "Filter configuration and saturation", body = InfoResponse),
        (status = 503, description = "Filter not initialized", body = ErrorResponse)
    )
)]
async fn info(State(state): State<Arc<AppState>>) -> Response {
    let describe = || -> crate::Result<InfoResponse> {
        let filter = state.registry.filter()?;
        let config = filter.config()?;
        let (bit_vector_size, num_hashes) = filter.params()?;
        let ratios = filter.generation_fill_ratios()?;
        Ok(InfoResponse {
            capacity: config.bloom.capacity,
            false_positive_rate: config.bloom.false_positive_rate,
            hash_strategy: config.bloom.hash_strategy.to_string(),
            ttl_secs: config.ttl.as_secs_f64(),
            bit_vector_size,
            num_hashes,
            fill_ratio: ratios.iter().sum::<f64>() / ratios.len() as f64,
            generation_fill_ratios: ratios.to_vec(),
        })
    };
    match describe() {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi),
        )
        .route("/health", get(health_check))
        .route("/add", post(add_elems))
        .route("/check", post(check_elems))
        // peer snapshots easily exceed the default body limit
        .route(
            "/union",
            post(union_filter).layer(DefaultBodyLimit::disable()),
        )
        .route("/snapshot", get(snapshot))
        .route("/info", get(info))
        .with_state(state)
}
