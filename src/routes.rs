use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Protected API
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(TraceLayer::new_for_http());

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security));
    }

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cafes", get(public::cafes_list))
        .route("/api/cafes/:id", get(public::cafe_get))
        .route("/api/cafes/city/:name", get(public::cafes_by_city))
        .route("/api/cafes/user/:uid", get(public::cafes_by_user))
        .route("/api/users", get(public::users_list))
        .route("/api/users/signup", post(public::user_signup))
        .route("/api/users/login", post(public::user_login))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/cafes", post(protected::cafe_create))
        .route(
            "/api/cafes/:id",
            patch(protected::cafe_update).delete(protected::cafe_delete),
        )
        .route("/api/cafes/rating/:id", post(protected::cafe_rate))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Cafe Directory API",
            "version": version,
            "description": "Café directory with consistent café ownership",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "cafes": "/api/cafes[/:id], /api/cafes/city/:name, /api/cafes/user/:uid",
                "users": "/api/users, /api/users/signup, /api/users/login (public)",
                "cafe_writes": "POST /api/cafes, PATCH|DELETE /api/cafes/:id, \
                    POST /api/cafes/rating/:id (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
