//! `SeaORM` Entity for the coupon redemption ledger

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per successful redemption. Append-only; rows are never mutated
/// or deleted. `(couponId, orderId)` is unique when `orderId` is present.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(schema_name = "public", table_name = "CouponUsage")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_name = "couponId", column_type = "Text")]
    pub coupon_id: String,
    #[sea_orm(column_name = "userId", column_type = "Text")]
    pub user_id: String,
    /// Order amount before the discount (in cents)
    #[sea_orm(column_name = "originalAmount")]
    pub original_amount: i64,
    #[sea_orm(column_name = "discountAmount")]
    pub discount_amount: i64,
    #[sea_orm(column_name = "finalAmount")]
    pub final_amount: i64,
    /// Extra trial days granted by a trial-extension coupon
    #[sea_orm(column_name = "trialExtensionDays", nullable)]
    pub trial_extension_days: Option<i64>,
    #[sea_orm(column_name = "orderId", column_type = "Text", nullable)]
    pub order_id: Option<String>,
    #[sea_orm(column_name = "subscriptionId", column_type = "Text", nullable)]
    pub subscription_id: Option<String>,
    #[sea_orm(column_name = "planId", column_type = "Text", nullable)]
    pub plan_id: Option<String>,
    #[sea_orm(column_name = "createdAt")]
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::coupon::Entity",
        from = "Column::CouponId",
        to = "super::coupon::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Coupon,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    User,
}

impl Related<super::coupon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coupon.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
