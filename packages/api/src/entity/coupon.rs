//! `SeaORM` Entity for promotional coupon codes

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A named discount rule with type, value, and eligibility constraints
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(schema_name = "public", table_name = "Coupon")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    /// Coupon code (e.g., "SAVE20"), stored upper-cased, unique
    #[sea_orm(column_type = "Text", unique)]
    pub code: String,
    /// Human-readable name for the coupon
    #[sea_orm(column_type = "Text")]
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Discount type: percentage, fixed amount, or trial extension
    #[sea_orm(column_name = "couponType")]
    pub coupon_type: super::sea_orm_active_enums::CouponType,
    /// Percentage (0-100), fixed amount in cents, or trial days
    pub value: i64,
    /// Minimum order amount required (in cents, null = no minimum)
    #[sea_orm(column_name = "minOrderAmount", nullable)]
    pub min_order_amount: Option<i64>,
    /// Hard cap on the computed discount (in cents, null = uncapped)
    #[sea_orm(column_name = "maxDiscountAmount", nullable)]
    pub max_discount_amount: Option<i64>,
    /// Maximum total redemptions (null = unlimited)
    #[sea_orm(column_name = "usageLimit", nullable)]
    pub usage_limit: Option<i64>,
    /// Maximum redemptions per user (null = unlimited)
    #[sea_orm(column_name = "usageLimitPerUser", nullable)]
    pub usage_limit_per_user: Option<i64>,
    /// Successful redemptions so far; enforcement point for `usageLimit`
    #[sea_orm(column_name = "redeemedCount")]
    pub redeemed_count: i64,
    /// When the coupon becomes active (inclusive)
    #[sea_orm(column_name = "validFrom")]
    pub valid_from: DateTime,
    /// When the coupon expires (inclusive, null = never)
    #[sea_orm(column_name = "validUntil", nullable)]
    pub valid_until: Option<DateTime>,
    /// JSON array of eligible plan ids; empty = all plans
    #[sea_orm(column_name = "applicablePlans", column_type = "JsonBinary")]
    pub applicable_plans: Json,
    /// Restricted to users with no prior paid order or subscription
    #[sea_orm(column_name = "firstTimeUsersOnly")]
    pub first_time_users_only: bool,
    /// Soft-disable flag; coupons are never physically deleted
    #[sea_orm(column_name = "isActive")]
    pub is_active: bool,
    #[sea_orm(column_name = "createdAt")]
    pub created_at: DateTime,
    #[sea_orm(column_name = "updatedAt")]
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_usage::Entity")]
    CouponUsage,
}

impl Related<super::coupon_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponUsage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
