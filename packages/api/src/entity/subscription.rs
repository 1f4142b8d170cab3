//! `SeaORM` Entity for recurring subscriptions

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(schema_name = "public", table_name = "Subscription")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_name = "userId", column_type = "Text")]
    pub user_id: String,
    #[sea_orm(column_name = "planId", column_type = "Text")]
    pub plan_id: String,
    pub status: super::sea_orm_active_enums::SubscriptionStatus,
    #[sea_orm(column_name = "stripeSubscriptionId", column_type = "Text", nullable)]
    pub stripe_subscription_id: Option<String>,
    #[sea_orm(column_name = "trialEnd", nullable)]
    pub trial_end: Option<DateTime>,
    #[sea_orm(column_name = "currentPeriodEnd", nullable)]
    pub current_period_end: Option<DateTime>,
    #[sea_orm(column_name = "createdAt")]
    pub created_at: DateTime,
    #[sea_orm(column_name = "updatedAt")]
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
