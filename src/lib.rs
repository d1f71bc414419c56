pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;
pub mod store;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{extract::State, routing::post, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let log_requests = state.config.api.enable_request_logging;

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Content API: reads are public, mutations verify the bearer token
        // through the RequestContext extractor
        .route("/api/content/:kind/save", post(handlers::content::save))
        .route("/api/content/:kind/publish", post(handlers::content::publish))
        .route("/api/content/:kind/list", get(handlers::content::list))
        .route(
            "/api/content/:kind/:id_or_slug",
            get(handlers::content::get_one)
                .put(handlers::content::update)
                .delete(handlers::content::delete),
        )
        .layer(cors);

    if log_requests {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

/// CORS for the external builder and the tenant app. tower-http adds
/// `Vary: Origin` on its own.
fn cors_layer(config: &crate::config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "name": "Brandhub Content API",
        "version": version,
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "save": "POST /api/content/:kind/save (content:write)",
            "publish": "POST /api/content/:kind/publish (content:write)",
            "update": "PUT /api/content/:kind/:id_or_slug (content:write)",
            "delete": "DELETE /api/content/:kind/:id (content:write)",
            "get": "GET /api/content/:kind/:id_or_slug (public)",
            "list": "GET /api/content/:kind/list (public)",
        },
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": "ok",
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "status": "degraded",
                "timestamp": now,
                "store_error": e.to_string(),
            })),
        ),
    }
}
