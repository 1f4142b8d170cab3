use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub mod coupons;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/coupons",
            get(coupons::list_coupons).post(coupons::create_coupon),
        )
        .route(
            "/coupons/{coupon_id}",
            get(coupons::get_coupon).patch(coupons::update_coupon),
        )
        .route("/coupons/{coupon_id}/toggle", post(coupons::toggle_coupon))
}
