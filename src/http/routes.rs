//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::app::AppState;
use crate::map::{list_maps, map_file_name, MapError, MapListing};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// URL prefix map files are served under
pub const MAPS_PREFIX: &str = "/maps";

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.config.client_origin))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Static client build; the browser must never cache it
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route(MAPS_PREFIX, get(maps_handler))
        .route("/maps/:file", get(map_file_handler))
        .fallback_service(static_files)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn allowed_origin(client_origin: &str) -> AllowOrigin {
    if client_origin.trim() == "*" {
        return AllowOrigin::any();
    }
    // Support multiple origins (comma-separated)
    let origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    AllowOrigin::list(origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.lobby.stats();
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: stats.room_count(),
        active_players: stats.player_count(),
    })
}

// ============================================================================
// Map endpoints
// ============================================================================

async fn maps_handler(State(state): State<AppState>) -> Result<Json<Vec<MapListing>>, AppError> {
    let listing = list_maps(&state.config.maps_dir, MAPS_PREFIX).await?;
    Ok(Json(listing))
}

async fn map_file_handler(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    let name = map_file_name(&file)?;
    let text = tokio::fs::read_to_string(state.config.maps_dir.join(name))
        .await
        .map_err(MapError::from)?;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MapError> for AppError {
    fn from(e: MapError) -> Self {
        match e {
            MapError::InvalidUrl(url) => AppError::NotFound(url),
            MapError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                AppError::NotFound("map".to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => {
                warn!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;

    fn test_state() -> (AppState, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("snype-http-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("arena.smf"), "#! v1\n---\nname: \"Arena\"\n---\nSpawn 1 1 0\n").unwrap();

        let config = Config {
            maps_dir: dir.clone(),
            static_dir: dir.join("dist"),
            ..Config::default()
        };
        (AppState::new(config), dir)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Option<HeaderValue>, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let cache = response.headers().get(header::CACHE_CONTROL).cloned();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, cache, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (state, dir) = test_state();
        let (status, _, body) = get(build_router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_rooms"], 0);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_map_listing_and_file() {
        let (state, dir) = test_state();
        let router = build_router(state);

        let (status, _, body) = get(router.clone(), "/maps").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json[0]["path"], "/maps/arena.smf");
        assert_eq!(json[0]["metadata"]["name"], "Arena");

        let (status, cache, body) = get(router.clone(), "/maps/arena.smf").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, Some(HeaderValue::from_static("no-cache")));
        assert!(body.starts_with("#! v1"));

        let (status, _, _) = get(router.clone(), "/maps/missing.smf").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = get(router, "/maps/notes.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        std::fs::remove_dir_all(dir).ok();
    }
}
