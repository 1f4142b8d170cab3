use crate::{
    entity::{coupon, coupon_usage, sea_orm_active_enums::CouponType},
    error::ApiError,
    middleware::jwt::AppUser,
    permission::GlobalPermission,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use woofadaar_types::create_id;

use super::super::PaginationParams;

#[derive(Debug, Deserialize)]
pub struct ListCouponsQuery {
    /// Filter to only active coupons
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponsListResponse {
    pub coupons: Vec<CouponResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResponse {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub coupon_type: String,
    pub value: i64,
    pub min_order_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub usage_limit_per_user: Option<i64>,
    pub redeemed_count: i64,
    pub valid_from: String,
    pub valid_until: Option<String>,
    pub applicable_plans: Vec<String>,
    pub first_time_users_only: bool,
    pub is_active: bool,
    pub is_valid: bool,
    pub created_at: String,
}

impl From<coupon::Model> for CouponResponse {
    fn from(c: coupon::Model) -> Self {
        let now = Utc::now().naive_utc();
        let is_valid = c.is_active
            && c.valid_from <= now
            && c.valid_until.map(|e| e >= now).unwrap_or(true)
            && c.usage_limit.map(|m| c.redeemed_count < m).unwrap_or(true);

        let applicable_plans = c
            .applicable_plans
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: c.id,
            code: c.code,
            name: c.name,
            description: c.description,
            coupon_type: format!("{:?}", c.coupon_type),
            value: c.value,
            min_order_amount: c.min_order_amount,
            max_discount_amount: c.max_discount_amount,
            usage_limit: c.usage_limit,
            usage_limit_per_user: c.usage_limit_per_user,
            redeemed_count: c.redeemed_count,
            valid_from: c.valid_from.to_string(),
            valid_until: c.valid_until.map(|e| e.to_string()),
            applicable_plans,
            first_time_users_only: c.first_time_users_only,
            is_active: c.is_active,
            is_valid,
            created_at: c.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDetailResponse {
    #[serde(flatten)]
    pub coupon: CouponResponse,
    /// Ledger row count; equals `redeemedCount` by invariant
    pub usage_rows: u64,
    pub distinct_users: u64,
    pub total_discounted: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// "percentage", "fixed_amount" or "free_trial_extension"
    pub coupon_type: String,
    /// Percentage (0-100), fixed amount in cents, or trial days
    pub value: i64,
    pub min_order_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub usage_limit_per_user: Option<i64>,
    /// ISO 8601 datetime string; defaults to now
    pub valid_from: Option<String>,
    /// ISO 8601 datetime string; null = never expires
    pub valid_until: Option<String>,
    #[serde(default)]
    pub applicable_plans: Vec<String>,
    #[serde(default)]
    pub first_time_users_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_order_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub usage_limit_per_user: Option<i64>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub applicable_plans: Option<Vec<String>>,
    pub first_time_users_only: Option<bool>,
}

fn parse_coupon_type(raw: &str) -> Result<CouponType, ApiError> {
    match raw.to_lowercase().as_str() {
        "percentage" => Ok(CouponType::Percentage),
        "fixed_amount" | "fixed" => Ok(CouponType::FixedAmount),
        "free_trial_extension" | "trial_extension" => Ok(CouponType::FreeTrialExtension),
        _ => Err(ApiError::bad_request(
            "coupon_type must be 'percentage', 'fixed_amount' or 'free_trial_extension'"
                .to_string(),
        )),
    }
}

fn parse_datetime(raw: &str, field: &str) -> Result<NaiveDateTime, ApiError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ApiError::bad_request(format!("Invalid {} date format", field)))
}

fn validate_value(coupon_type: &CouponType, value: i64) -> Result<(), ApiError> {
    if value < 0 {
        return Err(ApiError::bad_request(
            "Coupon value cannot be negative".to_string(),
        ));
    }
    if *coupon_type == CouponType::Percentage && value > 100 {
        return Err(ApiError::bad_request(
            "Percentage coupon must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

fn validate_plans(state: &AppState, plans: &[String]) -> Result<Vec<String>, ApiError> {
    let mut normalized = Vec::with_capacity(plans.len());
    for plan in plans {
        if state.platform_config.plan(plan).is_none() {
            return Err(ApiError::bad_request(format!("Unknown plan: {}", plan)));
        }
        normalized.push(plan.to_uppercase());
    }
    Ok(normalized)
}

/// GET /admin/coupons - List all coupons
#[tracing::instrument(name = "GET /admin/coupons", skip(state, user))]
pub async fn list_coupons(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Query(query): Query<ListCouponsQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<CouponsListResponse>, ApiError> {
    user.check_global_permission(&state, GlobalPermission::MANAGE_COUPONS)
        .await?;

    let offset = pagination.offset.unwrap_or(0);
    let limit = pagination.limit.unwrap_or(50).min(100);

    let mut query_builder = coupon::Entity::find();

    if query.active_only {
        query_builder = query_builder.filter(coupon::Column::IsActive.eq(true));
    }

    let total = query_builder.clone().count(&state.db).await?;

    let coupons = query_builder
        .order_by_desc(coupon::Column::CreatedAt)
        .offset(offset)
        .limit(limit)
        .all(&state.db)
        .await?;

    Ok(Json(CouponsListResponse {
        coupons: coupons.into_iter().map(Into::into).collect(),
        total,
        offset,
        limit,
    }))
}

/// GET /admin/coupons/{coupon_id} - Get a coupon with usage stats
#[tracing::instrument(name = "GET /admin/coupons/{coupon_id}", skip(state, user))]
pub async fn get_coupon(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Path(coupon_id): Path<String>,
) -> Result<Json<CouponDetailResponse>, ApiError> {
    user.check_global_permission(&state, GlobalPermission::MANAGE_COUPONS)
        .await?;

    let coupon = coupon::Entity::find_by_id(&coupon_id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NOT_FOUND)?;

    let usages = coupon_usage::Entity::find()
        .filter(coupon_usage::Column::CouponId.eq(&coupon_id))
        .all(&state.db)
        .await?;

    let usage_rows = usages.len() as u64;
    let distinct_users = usages
        .iter()
        .map(|u| u.user_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len() as u64;
    let total_discounted: i64 = usages.iter().map(|u| u.discount_amount).sum();

    Ok(Json(CouponDetailResponse {
        coupon: coupon.into(),
        usage_rows,
        distinct_users,
        total_discounted,
    }))
}

/// POST /admin/coupons - Create a new coupon
#[tracing::instrument(name = "POST /admin/coupons", skip(state, user, body))]
pub async fn create_coupon(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Json(body): Json<CreateCouponRequest>,
) -> Result<Json<CouponResponse>, ApiError> {
    user.check_global_permission(&state, GlobalPermission::MANAGE_COUPONS)
        .await?;

    let code = body.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::bad_request("Coupon code is required".to_string()));
    }

    let existing = coupon::Entity::find()
        .filter(coupon::Column::Code.eq(&code))
        .one(&state.db)
        .await?;

    if existing.is_some() {
        return Err(ApiError::conflict(
            "A coupon with this code already exists".to_string(),
        ));
    }

    let coupon_type = parse_coupon_type(&body.coupon_type)?;
    validate_value(&coupon_type, body.value)?;
    let applicable_plans = validate_plans(&state, &body.applicable_plans)?;

    let now = Utc::now().naive_utc();

    let valid_from = match body.valid_from.as_deref() {
        Some(raw) => parse_datetime(raw, "valid_from")?,
        None => now,
    };
    let valid_until = body
        .valid_until
        .as_deref()
        .map(|raw| parse_datetime(raw, "valid_until"))
        .transpose()?;

    if let Some(until) = valid_until
        && until < valid_from
    {
        return Err(ApiError::bad_request(
            "valid_until must not be before valid_from".to_string(),
        ));
    }

    let id = create_id();

    let new_coupon = coupon::ActiveModel {
        id: Set(id.clone()),
        code: Set(code),
        name: Set(body.name),
        description: Set(body.description),
        coupon_type: Set(coupon_type),
        value: Set(body.value),
        min_order_amount: Set(body.min_order_amount),
        max_discount_amount: Set(body.max_discount_amount),
        usage_limit: Set(body.usage_limit),
        usage_limit_per_user: Set(body.usage_limit_per_user),
        redeemed_count: Set(0),
        valid_from: Set(valid_from),
        valid_until: Set(valid_until),
        applicable_plans: Set(serde_json::json!(applicable_plans)),
        first_time_users_only: Set(body.first_time_users_only),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = new_coupon.insert(&state.db).await?;

    tracing::info!(
        coupon_id = %id,
        code = %created.code,
        "Coupon created"
    );

    Ok(Json(created.into()))
}

/// PATCH /admin/coupons/{coupon_id} - Edit caps, window, and description
/// fields. Code, type, and value are immutable after creation.
#[tracing::instrument(name = "PATCH /admin/coupons/{coupon_id}", skip(state, user, body))]
pub async fn update_coupon(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Path(coupon_id): Path<String>,
    Json(body): Json<UpdateCouponRequest>,
) -> Result<Json<CouponResponse>, ApiError> {
    user.check_global_permission(&state, GlobalPermission::MANAGE_COUPONS)
        .await?;

    let existing = coupon::Entity::find_by_id(&coupon_id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NOT_FOUND)?;

    let valid_from = existing.valid_from;
    let mut active: coupon::ActiveModel = existing.into();

    if let Some(name) = body.name {
        active.name = Set(name);
    }

    if let Some(description) = body.description {
        active.description = Set(Some(description));
    }

    if let Some(min_amount) = body.min_order_amount {
        active.min_order_amount = Set(Some(min_amount));
    }

    if let Some(max_discount) = body.max_discount_amount {
        active.max_discount_amount = Set(Some(max_discount));
    }

    if let Some(usage_limit) = body.usage_limit {
        active.usage_limit = Set(Some(usage_limit));
    }

    if let Some(per_user) = body.usage_limit_per_user {
        active.usage_limit_per_user = Set(Some(per_user));
    }

    let mut window_start = valid_from;
    if let Some(raw) = body.valid_from {
        window_start = parse_datetime(&raw, "valid_from")?;
        active.valid_from = Set(window_start);
    }

    if let Some(raw) = body.valid_until {
        let until = parse_datetime(&raw, "valid_until")?;
        if until < window_start {
            return Err(ApiError::bad_request(
                "valid_until must not be before valid_from".to_string(),
            ));
        }
        active.valid_until = Set(Some(until));
    }

    if let Some(plans) = body.applicable_plans {
        let normalized = validate_plans(&state, &plans)?;
        active.applicable_plans = Set(serde_json::json!(normalized));
    }

    if let Some(first_time) = body.first_time_users_only {
        active.first_time_users_only = Set(first_time);
    }

    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active.update(&state.db).await?;

    tracing::info!(
        coupon_id = %coupon_id,
        "Coupon updated"
    );

    Ok(Json(updated.into()))
}

/// POST /admin/coupons/{coupon_id}/toggle - Flip the soft-disable flag.
/// There is no delete; the usage ledger must keep its referent.
#[tracing::instrument(name = "POST /admin/coupons/{coupon_id}/toggle", skip(state, user))]
pub async fn toggle_coupon(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Path(coupon_id): Path<String>,
) -> Result<Json<CouponResponse>, ApiError> {
    user.check_global_permission(&state, GlobalPermission::MANAGE_COUPONS)
        .await?;

    let existing = coupon::Entity::find_by_id(&coupon_id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NOT_FOUND)?;

    let new_active = !existing.is_active;

    let mut active: coupon::ActiveModel = existing.into();
    active.is_active = Set(new_active);
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active.update(&state.db).await?;

    tracing::info!(
        coupon_id = %coupon_id,
        is_active = new_active,
        "Coupon toggled"
    );

    Ok(Json(updated.into()))
}
