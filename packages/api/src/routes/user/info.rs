use axum::{Extension, Json, extract::State};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::{
    entity::subscription, error::ApiError, middleware::jwt::AppUser, state::AppState,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub plan_id: String,
    pub status: String,
    pub trial_end: Option<String>,
    pub current_period_end: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub subscription: Option<SubscriptionInfo>,
}

#[tracing::instrument(name = "GET /user/info", skip(state, user))]
pub async fn user_info(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
) -> Result<Json<UserInfoResponse>, ApiError> {
    let db_user = user.get_user(&state).await?;

    let subscription = subscription::Entity::find()
        .filter(subscription::Column::UserId.eq(&db_user.id))
        .order_by_desc(subscription::Column::CreatedAt)
        .one(&state.db)
        .await?
        .map(|s| SubscriptionInfo {
            plan_id: s.plan_id,
            status: format!("{:?}", s.status),
            trial_end: s.trial_end.map(|d| d.to_string()),
            current_period_end: s.current_period_end.map(|d| d.to_string()),
        });

    Ok(Json(UserInfoResponse {
        id: db_user.id,
        email: db_user.email,
        name: db_user.name,
        subscription,
    }))
}
