//! HTTP route definitions

use std::sync::atomic::Ordering;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);
    let assets = ServeDir::new(&state.config.public_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/gamestate", get(gamestate_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(assets)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS configuration - `*` or a comma-separated list of origins
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: uptime_secs(),
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Debug endpoint
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct GameStateResponse {
    pub player_count: usize,
    pub bullet_count: usize,
    pub session_count: usize,
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
}

async fn gamestate_handler(State(state): State<AppState>) -> Json<GameStateResponse> {
    Json(GameStateResponse {
        player_count: state.game.player_count(),
        bullet_count: state.game.bullet_count(),
        session_count: state.sessions.len(),
        tick: state.tick.load(Ordering::Relaxed),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::state::{Bullet, Vec2};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app_state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        let (state, _simulation) = AppState::new(config);
        state
    }

    async fn get_json<T: serde::de::DeserializeOwned>(router: Router, uri: &str) -> T {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let health: HealthResponse = get_json(build_router(app_state()), "/health").await;
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn gamestate_reports_counts() {
        let state = app_state();
        let _a = state.gateway.connect(Uuid::new_v4()).unwrap();
        let _b = state.gateway.connect(Uuid::new_v4()).unwrap();
        state
            .game
            .add_bullet(Bullet::new("b".into(), Uuid::new_v4(), Vec2::new(1.0, 1.0), 0.0));

        let report: GameStateResponse = get_json(build_router(state), "/api/gamestate").await;
        assert_eq!(report.player_count, 2);
        assert_eq!(report.session_count, 2);
        assert_eq!(report.bullet_count, 1);
        assert_eq!(report.tick, 0);
    }

    #[tokio::test]
    async fn unknown_asset_is_not_found() {
        let response = build_router(app_state())
            .oneshot(
                Request::builder()
                    .uri("/definitely-missing.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
