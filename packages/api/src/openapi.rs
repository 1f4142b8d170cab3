use utoipa::{
    Modify, OpenApi,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};

/// Security scheme modifier to add authentication methods
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Woofadaar API",
        description = "Coupon validation, redemption, and billing service",
        version = "0.1.0"
    ),
    paths(
        crate::routes::health::health,
        crate::routes::health::db_health,
        crate::routes::coupons::validate,
        crate::routes::coupons::apply,
        crate::routes::coupons::available,
        crate::routes::user::subscribe::create_subscription_checkout,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::routes::health::DbHealthResponse,
        crate::routes::coupons::CouponSummary,
        crate::routes::coupons::RejectionBody,
        crate::routes::coupons::ValidateCouponRequest,
        crate::routes::coupons::ValidateCouponResponse,
        crate::routes::coupons::ApplyCouponRequest,
        crate::routes::coupons::ApplyCouponResponse,
        crate::routes::coupons::AvailableCouponsResponse,
        crate::routes::user::subscribe::SubscribeRequest,
        crate::routes::user::subscribe::SubscribeResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service health probes"),
        (name = "coupons", description = "Coupon validation and redemption"),
        (name = "user", description = "User account and billing")
    )
)]
pub struct ApiDoc;
