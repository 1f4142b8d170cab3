use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use error::InternalError;
use middleware::jwt::jwt_middleware;
use state::{AppState, State};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, decompression::RequestDecompressionLayer,
};
use utoipa::OpenApi;
use woofadaar_types::Value;

pub mod config;
pub mod coupons;
pub mod entity;
mod middleware;
mod openapi;
mod routes;

pub mod error;
pub mod permission;
pub mod state;

pub use axum;
pub mod auth {
    use crate::middleware;
    pub use middleware::jwt::AppUser;
}

pub use sea_orm;

pub fn construct_router(state: Arc<State>) -> Router {
    let router = Router::new()
        .route("/", get(platform_info))
        .nest("/health", routes::health::routes())
        .nest("/coupons", routes::coupons::routes())
        .nest("/user", routes::user::routes())
        .nest("/admin", routes::admin::routes())
        .route("/webhook/stripe", post(routes::webhook::stripe_webhook))
        .route("/openapi.json", get(openapi_doc))
        .with_state(state.clone())
        .route("/version", get(|| async { "0.1.0" }))
        .layer(from_fn_with_state(state.clone(), jwt_middleware))
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new()),
        );

    Router::new().nest("/api/v1", router)
}

#[tracing::instrument(name = "GET /", skip(state))]
async fn platform_info(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<Value>, InternalError> {
    let value: Value = serde_json::to_value(&state.platform_config)?;
    Ok(Json(value))
}

async fn openapi_doc() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}
