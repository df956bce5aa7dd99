//! Storefront API Library
//!
//! REST backend for an auto-parts storefront and its seller panel:
//! products with image lifecycle management, categories and vehicle
//! compatibility records.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Extension, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::SellerAuth;
use crate::config::AppConfig;
use crate::handlers::common::{success_response, ApiResult};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: handlers::AppServices,
    pub seller_auth: Arc<SellerAuth>,
}

impl AppState {
    pub fn new(config: AppConfig, services: handlers::AppServices) -> Self {
        let seller_auth = Arc::new(SellerAuth::from_config(&config));
        Self {
            config: Arc::new(config),
            services,
            seller_auth,
        }
    }
}

/// Response envelope shared by every endpoint: `{success, message?, ...payload}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

/// Payload for responses that only carry a message.
#[derive(Debug, Default, Serialize)]
pub struct NoPayload {}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload,
        }
    }

    pub fn with_message(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            payload,
        }
    }
}

impl ApiResponse<NoPayload> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_message(message, NoPayload {})
    }
}

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/category", handlers::categories::category_routes())
        .nest("/car", handlers::cars::car_routes())
        .nest("/product", handlers::products::product_routes())
        .nest("/seller", handlers::seller::seller_routes())
}

#[derive(Debug, Serialize)]
struct HealthPayload {
    status: &'static str,
}

async fn health_check(State(state): State<AppState>) -> ApiResult {
    state.services.ping().await?;
    Ok(success_response(ApiResponse::success(HealthPayload { status: "ok" })))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

/// Full application router with middleware applied.
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;
    let seller_auth = state.seller_auth.clone();
    let cors = cors_layer(&state.config.cors_origins());

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(Extension(seller_auth))
        .layer(crate::tracing::configure_http_tracing());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(middleware::from_fn(
        middleware_helpers::request_id_middleware,
    ))
}
