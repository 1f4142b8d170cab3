//! Coupon engine: rule evaluation, transactional redemption, listing.
//!
//! Business rejections are data (`CouponRejection`), never errors. Only
//! storage failures surface as `ApiError`. The eligibility rules and the
//! discount arithmetic are pure functions over a fetched coupon row plus a
//! snapshot of the counts they depend on, so the async wrappers stay thin.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
    sea_query::Expr,
};
use serde::Serialize;

use crate::{
    entity::{
        coupon, coupon_usage, order,
        sea_orm_active_enums::{CouponType, OrderStatus},
        subscription,
    },
    error::ApiError,
};

/// Typed reason a coupon cannot be used. Every variant maps to a distinct
/// user-facing message; callers must not collapse them into one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    NotFound,
    NotYetActive,
    Expired,
    BelowMinimumOrder { minimum: i64 },
    PlanNotEligible,
    GlobalLimitReached,
    UserLimitReached,
    NotFirstTimeUser,
}

impl CouponRejection {
    pub fn code(&self) -> &'static str {
        match self {
            CouponRejection::NotFound => "COUPON_NOT_FOUND",
            CouponRejection::NotYetActive => "COUPON_NOT_YET_ACTIVE",
            CouponRejection::Expired => "COUPON_EXPIRED",
            CouponRejection::BelowMinimumOrder { .. } => "BELOW_MINIMUM_ORDER",
            CouponRejection::PlanNotEligible => "PLAN_NOT_ELIGIBLE",
            CouponRejection::GlobalLimitReached => "GLOBAL_LIMIT_REACHED",
            CouponRejection::UserLimitReached => "USER_LIMIT_REACHED",
            CouponRejection::NotFirstTimeUser => "NOT_FIRST_TIME_USER",
        }
    }

    pub fn message(&self) -> String {
        match self {
            CouponRejection::NotFound => "Coupon code not found.".to_string(),
            CouponRejection::NotYetActive => "This coupon is not active yet.".to_string(),
            CouponRejection::Expired => "This coupon has expired.".to_string(),
            CouponRejection::BelowMinimumOrder { minimum } => format!(
                "This coupon requires a minimum order amount of {}.",
                minimum
            ),
            CouponRejection::PlanNotEligible => {
                "This coupon is not valid for the selected plan.".to_string()
            }
            CouponRejection::GlobalLimitReached => {
                "This coupon has reached its redemption limit.".to_string()
            }
            CouponRejection::UserLimitReached => {
                "You have already used this coupon the maximum number of times.".to_string()
            }
            CouponRejection::NotFirstTimeUser => {
                "This coupon is only available to first-time customers.".to_string()
            }
        }
    }
}

/// Computed discount for a coupon against an order amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponBreakdown {
    pub original_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    /// Set for trial-extension coupons instead of a monetary discount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_extension_days: Option<i64>,
}

/// Everything the eligibility rules need beyond the coupon row itself.
#[derive(Debug, Clone)]
pub struct EligibilitySnapshot<'a> {
    pub now: NaiveDateTime,
    pub order_amount: i64,
    pub plan_id: Option<&'a str>,
    /// This user's ledger rows for this coupon.
    pub user_redemptions: i64,
    /// Whether the user holds or held a completed order or any subscription.
    pub prior_paid_activity: bool,
}

fn plan_ids(coupon: &coupon::Model) -> Vec<String> {
    coupon
        .applicable_plans
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_uppercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Validation sequence from the checkout rules, short-circuiting at the
/// first failure. The existence check happens at lookup time; this covers
/// the remaining steps in order: window, minimum, plan, global limit,
/// per-user limit, first-time restriction.
pub fn check_eligibility(
    coupon: &coupon::Model,
    snapshot: &EligibilitySnapshot,
) -> Result<(), CouponRejection> {
    if snapshot.now < coupon.valid_from {
        return Err(CouponRejection::NotYetActive);
    }
    // The window is inclusive on both ends.
    if let Some(valid_until) = coupon.valid_until
        && snapshot.now > valid_until
    {
        return Err(CouponRejection::Expired);
    }

    let minimum = coupon.min_order_amount.unwrap_or(0);
    if snapshot.order_amount < minimum {
        return Err(CouponRejection::BelowMinimumOrder { minimum });
    }

    let plans = plan_ids(coupon);
    if !plans.is_empty() {
        let eligible = snapshot
            .plan_id
            .map(|p| plans.contains(&p.to_uppercase()))
            .unwrap_or(false);
        if !eligible {
            return Err(CouponRejection::PlanNotEligible);
        }
    }

    if let Some(limit) = coupon.usage_limit
        && coupon.redeemed_count >= limit
    {
        return Err(CouponRejection::GlobalLimitReached);
    }

    if let Some(limit) = coupon.usage_limit_per_user
        && snapshot.user_redemptions >= limit
    {
        return Err(CouponRejection::UserLimitReached);
    }

    if coupon.first_time_users_only && snapshot.prior_paid_activity {
        return Err(CouponRejection::NotFirstTimeUser);
    }

    Ok(())
}

pub fn compute_breakdown(coupon: &coupon::Model, order_amount: i64) -> CouponBreakdown {
    let (discount, trial_days) = match coupon.coupon_type {
        CouponType::Percentage => {
            let mut discount = order_amount * coupon.value / 100;
            if let Some(cap) = coupon.max_discount_amount {
                discount = discount.min(cap);
            }
            (discount, None)
        }
        CouponType::FixedAmount => {
            let mut discount = coupon.value.min(order_amount);
            if let Some(cap) = coupon.max_discount_amount {
                discount = discount.min(cap);
            }
            (discount, None)
        }
        CouponType::FreeTrialExtension => (0, Some(coupon.value)),
    };

    let discount = discount.max(0);
    CouponBreakdown {
        original_amount: order_amount,
        discount_amount: discount,
        final_amount: (order_amount - discount).max(0),
        trial_extension_days: trial_days,
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedCoupon {
    pub coupon: coupon::Model,
    pub breakdown: CouponBreakdown,
}

#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Valid(ValidatedCoupon),
    Rejected(CouponRejection),
}

#[derive(Debug, Clone)]
pub struct AppliedCoupon {
    pub usage: coupon_usage::Model,
    pub breakdown: CouponBreakdown,
    /// True when a retry with the same order id hit the existing ledger row.
    pub already_recorded: bool,
}

#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(AppliedCoupon),
    Rejected(CouponRejection),
}

#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub code: String,
    pub user_id: String,
    pub order_amount: i64,
    pub order_id: Option<String>,
    pub subscription_id: Option<String>,
    pub plan_id: Option<String>,
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

async fn find_active_by_code<C: sea_orm::ConnectionTrait>(
    db: &C,
    code: &str,
) -> Result<Option<coupon::Model>, DbErr> {
    coupon::Entity::find()
        .filter(coupon::Column::Code.eq(normalize_code(code)))
        .filter(coupon::Column::IsActive.eq(true))
        .one(db)
        .await
}

async fn user_redemption_count<C: sea_orm::ConnectionTrait>(
    db: &C,
    coupon_id: &str,
    user_id: &str,
) -> Result<i64, DbErr> {
    let count = coupon_usage::Entity::find()
        .filter(coupon_usage::Column::CouponId.eq(coupon_id))
        .filter(coupon_usage::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count as i64)
}

/// A first-time user has no completed order and has never held a
/// subscription of any status.
async fn has_prior_paid_activity<C: sea_orm::ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<bool, DbErr> {
    let completed_orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.eq(OrderStatus::Completed))
        .count(db)
        .await?;
    if completed_orders > 0 {
        return Ok(true);
    }

    let subscriptions = subscription::Entity::find()
        .filter(subscription::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(subscriptions > 0)
}

async fn snapshot_for<C: sea_orm::ConnectionTrait>(
    db: &C,
    coupon: &coupon::Model,
    user_id: &str,
) -> Result<(i64, bool), DbErr> {
    let user_redemptions = if coupon.usage_limit_per_user.is_some() {
        user_redemption_count(db, &coupon.id, user_id).await?
    } else {
        0
    };
    let prior_paid_activity = if coupon.first_time_users_only {
        has_prior_paid_activity(db, user_id).await?
    } else {
        false
    };
    Ok((user_redemptions, prior_paid_activity))
}

/// Read-only validation. No side effects; safe to call repeatedly.
pub async fn validate_coupon(
    db: &DatabaseConnection,
    code: &str,
    user_id: &str,
    order_amount: i64,
    plan_id: Option<&str>,
) -> Result<ValidationOutcome, ApiError> {
    let Some(coupon) = find_active_by_code(db, code).await? else {
        return Ok(ValidationOutcome::Rejected(CouponRejection::NotFound));
    };

    let (user_redemptions, prior_paid_activity) = snapshot_for(db, &coupon, user_id).await?;

    let snapshot = EligibilitySnapshot {
        now: chrono::Utc::now().naive_utc(),
        order_amount,
        plan_id,
        user_redemptions,
        prior_paid_activity,
    };

    match check_eligibility(&coupon, &snapshot) {
        Ok(()) => {
            let breakdown = compute_breakdown(&coupon, order_amount);
            Ok(ValidationOutcome::Valid(ValidatedCoupon {
                coupon,
                breakdown,
            }))
        }
        Err(rejection) => Ok(ValidationOutcome::Rejected(rejection)),
    }
}

#[derive(Debug, thiserror::Error)]
enum TxnError {
    // Forces a rollback for business rejections; unwrapped by the caller.
    #[error("coupon rejected: {}", .0.code())]
    Rejected(CouponRejection),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Re-validates and records one redemption as a single atomic unit.
///
/// The hard `usage_limit` is enforced with a conditional increment of
/// `redeemedCount` in the same statement that checks it, so two concurrent
/// applications cannot both pass a nearly exhausted cap regardless of
/// isolation level. Any rejection aborts the transaction; failure leaves no
/// ledger row and no count mutation. A retry carrying an `order_id` that is
/// already in the ledger returns the previously recorded result unchanged.
pub async fn apply_coupon(
    db: &DatabaseConnection,
    request: ApplyRequest,
) -> Result<ApplyOutcome, ApiError> {
    let result = db
        .transaction::<_, AppliedCoupon, TxnError>(|txn| {
            Box::pin(async move {
                let coupon = find_active_by_code(txn, &request.code)
                    .await?
                    .ok_or(TxnError::Rejected(CouponRejection::NotFound))?;

                if let Some(order_id) = &request.order_id {
                    let existing = coupon_usage::Entity::find()
                        .filter(coupon_usage::Column::CouponId.eq(&coupon.id))
                        .filter(coupon_usage::Column::OrderId.eq(order_id))
                        .one(txn)
                        .await?;
                    if let Some(usage) = existing {
                        let breakdown = CouponBreakdown {
                            original_amount: usage.original_amount,
                            discount_amount: usage.discount_amount,
                            final_amount: usage.final_amount,
                            trial_extension_days: usage.trial_extension_days,
                        };
                        return Ok(AppliedCoupon {
                            usage,
                            breakdown,
                            already_recorded: true,
                        });
                    }
                }

                let (user_redemptions, prior_paid_activity) =
                    snapshot_for(txn, &coupon, &request.user_id).await?;

                let now = chrono::Utc::now().naive_utc();
                let snapshot = EligibilitySnapshot {
                    now,
                    order_amount: request.order_amount,
                    plan_id: request.plan_id.as_deref(),
                    user_redemptions,
                    prior_paid_activity,
                };
                check_eligibility(&coupon, &snapshot).map_err(TxnError::Rejected)?;

                let breakdown = compute_breakdown(&coupon, request.order_amount);

                // Atomic increment-and-check: the WHERE clause re-reads the
                // live count, so a concurrent redemption that exhausted the
                // cap since our fetch makes this update touch zero rows.
                let mut increment = coupon::Entity::update_many()
                    .col_expr(
                        coupon::Column::RedeemedCount,
                        Expr::col(coupon::Column::RedeemedCount).add(1),
                    )
                    .col_expr(coupon::Column::UpdatedAt, Expr::value(now))
                    .filter(coupon::Column::Id.eq(&coupon.id));
                if let Some(limit) = coupon.usage_limit {
                    increment = increment.filter(coupon::Column::RedeemedCount.lt(limit));
                }
                let incremented = increment.exec(txn).await?;
                if incremented.rows_affected == 0 {
                    return Err(TxnError::Rejected(CouponRejection::GlobalLimitReached));
                }

                let usage = coupon_usage::ActiveModel {
                    id: Set(woofadaar_types::create_id()),
                    coupon_id: Set(coupon.id.clone()),
                    user_id: Set(request.user_id.clone()),
                    original_amount: Set(breakdown.original_amount),
                    discount_amount: Set(breakdown.discount_amount),
                    final_amount: Set(breakdown.final_amount),
                    trial_extension_days: Set(breakdown.trial_extension_days),
                    order_id: Set(request.order_id.clone()),
                    subscription_id: Set(request.subscription_id.clone()),
                    plan_id: Set(request.plan_id.as_ref().map(|p| p.to_uppercase())),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;

                tracing::info!(
                    coupon_id = %usage.coupon_id,
                    user_id = %usage.user_id,
                    discount_amount = usage.discount_amount,
                    "Coupon redeemed"
                );

                Ok(AppliedCoupon {
                    usage,
                    breakdown,
                    already_recorded: false,
                })
            })
        })
        .await;

    match result {
        Ok(applied) => Ok(ApplyOutcome::Applied(applied)),
        Err(sea_orm::TransactionError::Connection(err)) => Err(err.into()),
        Err(sea_orm::TransactionError::Transaction(TxnError::Rejected(rejection))) => {
            Ok(ApplyOutcome::Rejected(rejection))
        }
        Err(sea_orm::TransactionError::Transaction(TxnError::Db(err))) => Err(err.into()),
    }
}

/// Coupons the user could redeem right now. Read-only; counts toward
/// nothing. Window, global-limit, and minimum-order filters run in SQL;
/// plan membership, per-user limits, and the first-time restriction are
/// resolved over the fetched rows.
pub async fn available_coupons(
    db: &DatabaseConnection,
    user_id: &str,
    plan_id: Option<&str>,
    order_amount: Option<i64>,
) -> Result<Vec<coupon::Model>, ApiError> {
    let now = chrono::Utc::now().naive_utc();

    let mut query = coupon::Entity::find()
        .filter(coupon::Column::IsActive.eq(true))
        .filter(coupon::Column::ValidFrom.lte(now))
        .filter(
            Condition::any()
                .add(coupon::Column::ValidUntil.is_null())
                .add(coupon::Column::ValidUntil.gte(now)),
        )
        .filter(
            Condition::any()
                .add(coupon::Column::UsageLimit.is_null())
                .add(
                    Expr::col(coupon::Column::RedeemedCount)
                        .lt(Expr::col(coupon::Column::UsageLimit)),
                ),
        );

    if let Some(amount) = order_amount {
        query = query.filter(
            Condition::any()
                .add(coupon::Column::MinOrderAmount.is_null())
                .add(coupon::Column::MinOrderAmount.lte(amount)),
        );
    }

    let candidates = query
        .order_by_desc(coupon::Column::CreatedAt)
        .all(db)
        .await?;

    if candidates.is_empty() {
        return Ok(vec![]);
    }

    // One pass over the user's ledger covers every per-user limit check.
    let limited_ids: Vec<String> = candidates
        .iter()
        .filter(|c| c.usage_limit_per_user.is_some())
        .map(|c| c.id.clone())
        .collect();
    let mut user_counts: HashMap<String, i64> = HashMap::new();
    if !limited_ids.is_empty() {
        let rows = coupon_usage::Entity::find()
            .filter(coupon_usage::Column::UserId.eq(user_id))
            .filter(coupon_usage::Column::CouponId.is_in(limited_ids))
            .all(db)
            .await?;
        for row in rows {
            *user_counts.entry(row.coupon_id).or_default() += 1;
        }
    }

    let needs_first_time = candidates.iter().any(|c| c.first_time_users_only);
    let prior_paid_activity = if needs_first_time {
        has_prior_paid_activity(db, user_id).await?
    } else {
        false
    };

    let eligible = candidates
        .into_iter()
        .filter(|c| {
            let plans = plan_ids(c);
            if !plans.is_empty() {
                let matched = plan_id
                    .map(|p| plans.contains(&p.to_uppercase()))
                    .unwrap_or(false);
                if !matched {
                    return false;
                }
            }
            if let Some(limit) = c.usage_limit_per_user
                && user_counts.get(&c.id).copied().unwrap_or(0) >= limit
            {
                return false;
            }
            if c.first_time_users_only && prior_paid_activity {
                return false;
            }
            true
        })
        .collect();

    Ok(eligible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn test_coupon(coupon_type: CouponType, value: i64) -> coupon::Model {
        coupon::Model {
            id: "c_test".to_string(),
            code: "SAVE20".to_string(),
            name: "Test coupon".to_string(),
            description: None,
            coupon_type,
            value,
            min_order_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            usage_limit_per_user: None,
            redeemed_count: 0,
            valid_from: at(2025, 1, 1),
            valid_until: Some(at(2025, 12, 31)),
            applicable_plans: serde_json::json!([]),
            first_time_users_only: false,
            is_active: true,
            created_at: at(2025, 1, 1),
            updated_at: at(2025, 1, 1),
        }
    }

    fn snapshot(now: NaiveDateTime, order_amount: i64) -> EligibilitySnapshot<'static> {
        EligibilitySnapshot {
            now,
            order_amount,
            plan_id: None,
            user_redemptions: 0,
            prior_paid_activity: false,
        }
    }

    #[test]
    fn percentage_discount_clamps_to_cap() {
        let mut coupon = test_coupon(CouponType::Percentage, 20);
        coupon.max_discount_amount = Some(100);

        let breakdown = compute_breakdown(&coupon, 1000);
        assert_eq!(breakdown.discount_amount, 100);
        assert_eq!(breakdown.final_amount, 900);
    }

    #[test]
    fn percentage_discount_without_cap() {
        let coupon = test_coupon(CouponType::Percentage, 20);
        let breakdown = compute_breakdown(&coupon, 1000);
        assert_eq!(breakdown.discount_amount, 200);
        assert_eq!(breakdown.final_amount, 800);
    }

    #[test]
    fn fixed_amount_never_discounts_below_zero() {
        let coupon = test_coupon(CouponType::FixedAmount, 50);
        let breakdown = compute_breakdown(&coupon, 30);
        assert_eq!(breakdown.discount_amount, 30);
        assert_eq!(breakdown.final_amount, 0);
    }

    #[test]
    fn fixed_amount_respects_smaller_cap() {
        let mut coupon = test_coupon(CouponType::FixedAmount, 500);
        coupon.max_discount_amount = Some(200);
        let breakdown = compute_breakdown(&coupon, 1000);
        assert_eq!(breakdown.discount_amount, 200);
        assert_eq!(breakdown.final_amount, 800);
    }

    #[test]
    fn trial_extension_has_no_monetary_discount() {
        let coupon = test_coupon(CouponType::FreeTrialExtension, 14);
        let breakdown = compute_breakdown(&coupon, 1000);
        assert_eq!(breakdown.discount_amount, 0);
        assert_eq!(breakdown.final_amount, 1000);
        assert_eq!(breakdown.trial_extension_days, Some(14));
    }

    #[test]
    fn validity_window_is_inclusive_on_both_ends() {
        let coupon = test_coupon(CouponType::Percentage, 10);
        let until = coupon.valid_until.unwrap();

        assert!(check_eligibility(&coupon, &snapshot(coupon.valid_from, 100)).is_ok());
        assert!(check_eligibility(&coupon, &snapshot(until, 100)).is_ok());

        let just_after = until + Duration::microseconds(1);
        assert_eq!(
            check_eligibility(&coupon, &snapshot(just_after, 100)),
            Err(CouponRejection::Expired)
        );

        let just_before = coupon.valid_from - Duration::microseconds(1);
        assert_eq!(
            check_eligibility(&coupon, &snapshot(just_before, 100)),
            Err(CouponRejection::NotYetActive)
        );
    }

    #[test]
    fn minimum_order_amount_is_enforced() {
        let mut coupon = test_coupon(CouponType::Percentage, 10);
        coupon.min_order_amount = Some(500);

        assert_eq!(
            check_eligibility(&coupon, &snapshot(at(2025, 6, 1), 499)),
            Err(CouponRejection::BelowMinimumOrder { minimum: 500 })
        );
        assert!(check_eligibility(&coupon, &snapshot(at(2025, 6, 1), 500)).is_ok());
    }

    #[test]
    fn plan_restriction_requires_membership() {
        let mut coupon = test_coupon(CouponType::Percentage, 10);
        coupon.applicable_plans = serde_json::json!(["PREMIUM", "CORPORATE"]);

        let mut snap = snapshot(at(2025, 6, 1), 1000);
        snap.plan_id = Some("premium");
        assert!(check_eligibility(&coupon, &snap).is_ok());

        snap.plan_id = Some("BASIC");
        assert_eq!(
            check_eligibility(&coupon, &snap),
            Err(CouponRejection::PlanNotEligible)
        );

        // A restricted coupon without a plan in the request is not eligible.
        snap.plan_id = None;
        assert_eq!(
            check_eligibility(&coupon, &snap),
            Err(CouponRejection::PlanNotEligible)
        );
    }

    #[test]
    fn empty_plan_restriction_means_all_plans() {
        let coupon = test_coupon(CouponType::Percentage, 10);
        let mut snap = snapshot(at(2025, 6, 1), 1000);
        snap.plan_id = Some("ANY_PLAN");
        assert!(check_eligibility(&coupon, &snap).is_ok());
    }

    #[test]
    fn global_limit_gate() {
        let mut coupon = test_coupon(CouponType::Percentage, 10);
        coupon.usage_limit = Some(3);

        coupon.redeemed_count = 2;
        assert!(check_eligibility(&coupon, &snapshot(at(2025, 6, 1), 100)).is_ok());

        coupon.redeemed_count = 3;
        assert_eq!(
            check_eligibility(&coupon, &snapshot(at(2025, 6, 1), 100)),
            Err(CouponRejection::GlobalLimitReached)
        );
    }

    #[test]
    fn per_user_limit_gate() {
        let mut coupon = test_coupon(CouponType::Percentage, 10);
        coupon.usage_limit_per_user = Some(1);

        let mut snap = snapshot(at(2025, 6, 1), 100);
        assert!(check_eligibility(&coupon, &snap).is_ok());

        snap.user_redemptions = 1;
        assert_eq!(
            check_eligibility(&coupon, &snap),
            Err(CouponRejection::UserLimitReached)
        );
    }

    #[test]
    fn first_time_restriction_rejects_returning_users() {
        let mut coupon = test_coupon(CouponType::Percentage, 10);
        coupon.first_time_users_only = true;

        let mut snap = snapshot(at(2025, 6, 1), 100);
        assert!(check_eligibility(&coupon, &snap).is_ok());

        snap.prior_paid_activity = true;
        assert_eq!(
            check_eligibility(&coupon, &snap),
            Err(CouponRejection::NotFirstTimeUser)
        );
    }

    #[test]
    fn failures_short_circuit_in_rule_order() {
        // Expired AND over-limit: the window check wins.
        let mut coupon = test_coupon(CouponType::Percentage, 10);
        coupon.usage_limit = Some(1);
        coupon.redeemed_count = 1;

        let after = coupon.valid_until.unwrap() + Duration::days(1);
        assert_eq!(
            check_eligibility(&coupon, &snapshot(after, 100)),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut coupon = test_coupon(CouponType::Percentage, 20);
        coupon.max_discount_amount = Some(100);
        let snap = snapshot(at(2025, 6, 1), 1000);

        let first = (
            check_eligibility(&coupon, &snap),
            compute_breakdown(&coupon, 1000),
        );
        let second = (
            check_eligibility(&coupon, &snap),
            compute_breakdown(&coupon, 1000),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn rejection_messages_are_distinct() {
        let reasons = [
            CouponRejection::NotFound,
            CouponRejection::NotYetActive,
            CouponRejection::Expired,
            CouponRejection::BelowMinimumOrder { minimum: 500 },
            CouponRejection::PlanNotEligible,
            CouponRejection::GlobalLimitReached,
            CouponRejection::UserLimitReached,
            CouponRejection::NotFirstTimeUser,
        ];
        let mut messages: Vec<String> = reasons.iter().map(|r| r.message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), reasons.len());
    }
}
