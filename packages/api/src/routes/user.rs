use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub mod info;
pub mod subscribe;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/info", get(info::user_info))
        .route("/subscribe", post(subscribe::create_subscription_checkout))
}
