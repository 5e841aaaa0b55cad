//! HTTP server — router, shared state, auth middleware.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gatewatch_core::config::GatewayConfig;
use gatewatch_core::traits::{AccessSource, NotificationChannel, TrackStore, UserDirectory};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
pub struct AppState {
    pub store: Arc<dyn TrackStore>,
    pub channel: Arc<dyn NotificationChannel>,
    pub access: Arc<dyn AccessSource>,
    pub directory: Arc<dyn UserDirectory>,
    /// Expected `X-Auth-Token` value.
    pub auth_token: String,
    pub start_time: std::time::Instant,
}

/// Shared-secret middleware — rejects requests without a matching `X-Auth-Token`.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let provided = req
        .headers()
        .get("X-Auth-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !state.auth_token.is_empty() && provided == state.auth_token {
        return next.run(req).await;
    }

    tracing::debug!("🔒 Rejected {} {}", req.method(), req.uri().path());
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "Unauthorized"})),
    )
        .into_response()
}

/// Build the router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/track",
            post(super::routes::create_track).delete(super::routes::delete_track),
        )
        .route("/track/{chat_id}", get(super::routes::list_tracks))
        .route("/track/send/{chat_id}", get(super::routes::send_tracks))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let public = Router::new().route("/health", get(super::routes::health_check));

    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any)
        .max_age(std::time::Duration::from_secs(3600));

    protected
        .merge(public)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn start<F>(
    config: &GatewayConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("🌐 Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::tests::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(Request::get("/track/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(
                Request::get("/track/1")
                    .header("X-Auth-Token", "nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(
                Request::get("/track/1")
                    .header("X-Auth-Token", "test-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_create_through_router() {
        let (state, channel) = test_state();
        let resp = build_router(state)
            .oneshot(
                Request::post("/track")
                    .header("X-Auth-Token", "test-token")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"chatId":"555","run":"11111111-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (state, _) = test_state();
        let resp = build_router(state)
            .oneshot(
                Request::post("/track")
                    .header("X-Auth-Token", "test-token")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }
}
