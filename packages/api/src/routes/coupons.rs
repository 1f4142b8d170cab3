use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    coupons::{
        ApplyOutcome, ApplyRequest, CouponRejection, ValidationOutcome, apply_coupon,
        available_coupons, validate_coupon,
    },
    entity::{coupon, sea_orm_active_enums::CouponType},
    error::ApiError,
    middleware::jwt::AppUser,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate))
        .route("/apply", post(apply))
        .route("/available", get(available))
}

fn coupon_type_label(coupon_type: &CouponType) -> &'static str {
    match coupon_type {
        CouponType::Percentage => "percentage",
        CouponType::FixedAmount => "fixed_amount",
        CouponType::FreeTrialExtension => "free_trial_extension",
    }
}

/// Public-safe view of a coupon row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponSummary {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub coupon_type: String,
    pub value: i64,
    pub min_order_amount: Option<i64>,
    pub valid_until: Option<String>,
    pub first_time_users_only: bool,
}

impl From<coupon::Model> for CouponSummary {
    fn from(c: coupon::Model) -> Self {
        Self {
            code: c.code,
            name: c.name,
            description: c.description,
            coupon_type: coupon_type_label(&c.coupon_type).to_string(),
            value: c.value,
            min_order_amount: c.min_order_amount,
            valid_until: c.valid_until.map(|d| d.to_string()),
            first_time_users_only: c.first_time_users_only,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    pub reason: String,
    pub message: String,
}

impl From<CouponRejection> for RejectionBody {
    fn from(rejection: CouponRejection) -> Self {
        Self {
            reason: rejection.code().to_string(),
            message: rejection.message(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Order amount in cents; must be positive
    pub order_amount: i64,
    pub plan_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_extension_days: Option<i64>,
    #[serde(flatten)]
    pub rejection: Option<RejectionBody>,
}

#[utoipa::path(
    post,
    path = "/coupons/validate",
    tag = "coupons",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation outcome; `valid: false` carries a typed reason", body = ValidateCouponResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[tracing::instrument(name = "POST /coupons/validate", skip(state, user, body))]
pub async fn validate(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Json(body): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, ApiError> {
    // The token is trusted, but the id must still resolve to a live user row.
    let db_user = user.get_user(&state).await?;

    if body.order_amount <= 0 {
        return Err(ApiError::bad_request(
            "order_amount must be positive".to_string(),
        ));
    }

    let outcome = validate_coupon(
        &state.db,
        &body.code,
        &db_user.id,
        body.order_amount,
        body.plan_id.as_deref(),
    )
    .await?;

    let response = match outcome {
        ValidationOutcome::Valid(validated) => ValidateCouponResponse {
            valid: true,
            discount_amount: Some(validated.breakdown.discount_amount),
            final_amount: Some(validated.breakdown.final_amount),
            trial_extension_days: validated.breakdown.trial_extension_days,
            coupon: Some(validated.coupon.into()),
            rejection: None,
        },
        ValidationOutcome::Rejected(rejection) => ValidateCouponResponse {
            valid: false,
            coupon: None,
            discount_amount: None,
            final_amount: None,
            trial_extension_days: None,
            rejection: Some(rejection.into()),
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    pub code: String,
    /// Order amount in cents; must be positive
    pub order_amount: i64,
    /// De-duplication key: retries with the same order id are idempotent
    pub order_id: Option<String>,
    pub subscription_id: Option<String>,
    pub plan_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponResponse {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_extension_days: Option<i64>,
    /// True when this call was a retry and the redemption already existed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_recorded: bool,
    #[serde(flatten)]
    pub rejection: Option<RejectionBody>,
}

#[utoipa::path(
    post,
    path = "/coupons/apply",
    tag = "coupons",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Application outcome; a success has recorded exactly one ledger row", body = ApplyCouponResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[tracing::instrument(name = "POST /coupons/apply", skip(state, user, body))]
pub async fn apply(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Json(body): Json<ApplyCouponRequest>,
) -> Result<Json<ApplyCouponResponse>, ApiError> {
    let db_user = user.get_user(&state).await?;

    if body.order_amount <= 0 {
        return Err(ApiError::bad_request(
            "order_amount must be positive".to_string(),
        ));
    }

    let outcome = apply_coupon(
        &state.db,
        ApplyRequest {
            code: body.code,
            user_id: db_user.id,
            order_amount: body.order_amount,
            order_id: body.order_id,
            subscription_id: body.subscription_id,
            plan_id: body.plan_id,
        },
    )
    .await?;

    let response = match outcome {
        ApplyOutcome::Applied(applied) => ApplyCouponResponse {
            applied: true,
            usage_id: Some(applied.usage.id),
            original_amount: Some(applied.breakdown.original_amount),
            discount_amount: Some(applied.breakdown.discount_amount),
            final_amount: Some(applied.breakdown.final_amount),
            trial_extension_days: applied.breakdown.trial_extension_days,
            already_recorded: applied.already_recorded,
            rejection: None,
        },
        ApplyOutcome::Rejected(rejection) => ApplyCouponResponse {
            applied: false,
            usage_id: None,
            original_amount: None,
            discount_amount: None,
            final_amount: None,
            trial_extension_days: None,
            already_recorded: false,
            rejection: Some(rejection.into()),
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AvailableCouponsQuery {
    pub plan_id: Option<String>,
    pub order_amount: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCouponsResponse {
    pub coupons: Vec<CouponSummary>,
}

#[utoipa::path(
    get,
    path = "/coupons/available",
    tag = "coupons",
    params(
        ("plan_id" = Option<String>, Query, description = "Restrict to coupons eligible for this plan"),
        ("order_amount" = Option<i64>, Query, description = "Restrict to coupons whose minimum this amount meets")
    ),
    responses(
        (status = 200, description = "Coupons the user could redeem right now", body = AvailableCouponsResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[tracing::instrument(name = "GET /coupons/available", skip(state, user))]
pub async fn available(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Query(query): Query<AvailableCouponsQuery>,
) -> Result<Json<AvailableCouponsResponse>, ApiError> {
    let db_user = user.get_user(&state).await?;

    if let Some(amount) = query.order_amount
        && amount <= 0
    {
        return Err(ApiError::bad_request(
            "order_amount must be positive".to_string(),
        ));
    }

    let coupons = available_coupons(
        &state.db,
        &db_user.id,
        query.plan_id.as_deref(),
        query.order_amount,
    )
    .await?;

    Ok(Json(AvailableCouponsResponse {
        coupons: coupons.into_iter().map(Into::into).collect(),
    }))
}
