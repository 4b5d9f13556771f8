//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get},
    Router,
};
use serde_json::json;

use crate::api::response::api_success;
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::{OnAirError, OnAirResult};
use crate::protocol_constants::{APP_NAME, IMAGE_ROUTE_PREFIX, PUSH_ROUTE, SERVICE_ID};

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let image_route = format!("/{}{{image_ref}}", IMAGE_ROUTE_PREFIX);
    Router::new()
        .route("/health", get(health_check))
        .route(&image_route, get(serve_artwork))
        .route(PUSH_ROUTE, any(ws_handler))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let clients = state.notifier.client_count().await;
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "app": APP_NAME,
        "clients": clients,
        "connections": state.ws_manager.connection_count(),
    }))
}

/// Redirects a cached image reference to the image it stands for.
async fn serve_artwork(
    State(state): State<AppState>,
    Path(image_ref): Path<String>,
) -> OnAirResult<Response> {
    match state.store.image_source(&image_ref).await? {
        Some(url) => {
            log::debug!("[Artwork] {} -> {}", image_ref, url);
            Ok(Redirect::temporary(&url).into_response())
        }
        None => Err(OnAirError::NotFound(format!(
            "{}{}",
            IMAGE_ROUTE_PREFIX, image_ref
        ))),
    }
}
