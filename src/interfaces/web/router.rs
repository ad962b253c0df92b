use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tracing::Instrument;

use super::AppState;
use super::handlers::{data, publish, refresh, token};

const REQUEST_ID: &str = "x-request-id";

fn build_dashboard_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(super::health_endpoint))
        .route("/logs", get(super::sse_logs_endpoint))
        .route("/refresh", post(refresh::refresh_endpoint))
        .route("/publish/{kind}", post(publish::publish_endpoint))
        .route("/schedule", get(publish::list_scheduled_endpoint))
        .route(
            "/schedule/{target}",
            post(publish::schedule_endpoint).delete(publish::delete_scheduled_endpoint),
        )
        .route("/data/{source}", get(data::get_data_endpoint))
        .route("/token/validate", post(token::validate_token_endpoint))
}

/// Every route is served both at the root and under `/api`.
pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .nest("/api", routes())
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(build_dashboard_cors(&state.cors_origins))
        .with_state(state)
}

async fn request_id(req: Request<Body>, next: Next) -> axum::response::Response {
    let id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", id = %id, method = %req.method(), path = %req.uri().path());
    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
