//! Rack Admin - privileged user-management endpoints
//!
//! Thin axum service over the backend's admin API. Every endpoint validates
//! its JSON body before any backend call and answers `{ "error": ... }` on
//! failure.

pub mod api;
pub mod config;
pub mod error;
pub mod state;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Cross-origin policy: one allowed origin, or any when unset
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, header::InvalidHeaderValue> {
    match origin {
        None => Ok(CorsLayer::permissive()),
        Some(origin) => Ok(CorsLayer::new()
            .allow_origin(HeaderValue::from_str(origin)?)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])),
    }
}

/// Full application: routes, CORS and request tracing
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    api::create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://admin.example.com")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
