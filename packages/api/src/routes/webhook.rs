use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter,
};
use stripe::{Event, EventObject, EventType, Webhook};
use woofadaar_types::anyhow;

use crate::{
    entity::{sea_orm_active_enums::SubscriptionStatus, stripe_event, subscription},
    error::ApiError,
    state::AppState,
};

fn get_stripe_webhook_secret() -> Option<String> {
    std::env::var("STRIPE_WEBHOOK_SECRET").ok()
}

#[tracing::instrument(name = "POST /webhook/stripe", skip(state, headers, payload))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    state.require_stripe()?;

    let webhook_secret =
        get_stripe_webhook_secret().ok_or(anyhow!("Webhook secret not configured"))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(anyhow!("Missing stripe-signature header"))?;

    let payload_str =
        std::str::from_utf8(&payload).map_err(|_| anyhow!("Invalid UTF-8 in payload"))?;

    let event = Webhook::construct_event(payload_str, signature, &webhook_secret)
        .map_err(|e| anyhow!("Failed to verify webhook signature: {}", e))?;

    let event_id = event.id.to_string();
    if is_event_processed(&state, &event_id).await? {
        tracing::info!(event_id = %event_id, "Duplicate event, skipping");
        return Ok(StatusCode::OK);
    }

    match handle_stripe_event(&state, &event).await {
        Ok(_) => {
            mark_event_processed(&state, &event_id, &event.type_.to_string()).await?;
            Ok(StatusCode::OK)
        }
        Err(e) => {
            tracing::error!(event_id = %event_id, "Failed to process webhook");
            Err(e)
        }
    }
}

async fn is_event_processed(state: &AppState, event_id: &str) -> Result<bool, ApiError> {
    let existing = stripe_event::Entity::find_by_id(event_id)
        .one(&state.db)
        .await?;

    Ok(existing.is_some())
}

async fn mark_event_processed(
    state: &AppState,
    event_id: &str,
    event_type: &str,
) -> Result<(), ApiError> {
    let new_event = stripe_event::ActiveModel {
        id: Set(event_id.to_string()),
        event_type: Set(event_type.to_string()),
        processed_at: Set(chrono::Utc::now().naive_utc()),
    };

    new_event.insert(&state.db).await?;
    Ok(())
}

async fn handle_stripe_event(state: &AppState, event: &Event) -> Result<(), ApiError> {
    match event.type_ {
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = &event.data.object {
                handle_checkout_completed(state, session).await?;
            }
        }
        EventType::CustomerSubscriptionCreated
        | EventType::CustomerSubscriptionUpdated
        | EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(sub) = &event.data.object {
                handle_subscription_change(state, sub, &event.type_).await?;
            }
        }
        _ => {
            tracing::debug!(event_type = %event.type_, "Unhandled event type");
        }
    }

    Ok(())
}

fn map_subscription_status(status: stripe::SubscriptionStatus) -> SubscriptionStatus {
    match status {
        stripe::SubscriptionStatus::Trialing => SubscriptionStatus::Trialing,
        stripe::SubscriptionStatus::Active => SubscriptionStatus::Active,
        stripe::SubscriptionStatus::PastDue | stripe::SubscriptionStatus::Unpaid => {
            SubscriptionStatus::PastDue
        }
        stripe::SubscriptionStatus::Canceled | stripe::SubscriptionStatus::IncompleteExpired => {
            SubscriptionStatus::Canceled
        }
        other => {
            tracing::debug!(status = ?other, "Mapping uncommon subscription status to past_due");
            SubscriptionStatus::PastDue
        }
    }
}

fn naive_from_timestamp(ts: i64) -> Option<chrono::NaiveDateTime> {
    chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc())
}

async fn handle_checkout_completed(
    state: &AppState,
    session: &stripe::CheckoutSession,
) -> Result<(), ApiError> {
    let metadata = session.metadata.clone().unwrap_or_default();
    if metadata.get("type").map(String::as_str) != Some("subscription") {
        return Ok(());
    }

    let user_id = metadata
        .get("user_id")
        .ok_or(anyhow!("Missing user_id in session metadata"))?;
    let plan_id = metadata
        .get("plan_id")
        .ok_or(anyhow!("Missing plan_id in session metadata"))?;

    let stripe_subscription_id = match &session.subscription {
        Some(stripe::Expandable::Id(id)) => id.to_string(),
        Some(stripe::Expandable::Object(sub)) => sub.id.to_string(),
        None => {
            tracing::warn!(session_id = %session.id, "Completed session without subscription");
            return Ok(());
        }
    };

    let existing = subscription::Entity::find()
        .filter(subscription::Column::StripeSubscriptionId.eq(&stripe_subscription_id))
        .one(&state.db)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let now = chrono::Utc::now().naive_utc();
    let new_subscription = subscription::ActiveModel {
        id: Set(woofadaar_types::create_id()),
        user_id: Set(user_id.clone()),
        plan_id: Set(plan_id.clone()),
        status: Set(SubscriptionStatus::Active),
        stripe_subscription_id: Set(Some(stripe_subscription_id.clone())),
        trial_end: Set(None),
        current_period_end: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    new_subscription.insert(&state.db).await?;

    tracing::info!(
        user_id = %user_id,
        plan_id = %plan_id,
        stripe_subscription_id = %stripe_subscription_id,
        "Subscription recorded from checkout"
    );

    Ok(())
}

async fn handle_subscription_change(
    state: &AppState,
    stripe_sub: &stripe::Subscription,
    event_type: &EventType,
) -> Result<(), ApiError> {
    let stripe_subscription_id = stripe_sub.id.to_string();

    let existing = subscription::Entity::find()
        .filter(subscription::Column::StripeSubscriptionId.eq(&stripe_subscription_id))
        .one(&state.db)
        .await?;

    let Some(local) = existing else {
        // The checkout.session.completed handler creates the local row; a
        // subscription event can legitimately arrive first.
        tracing::debug!(
            stripe_subscription_id = %stripe_subscription_id,
            event_type = %event_type,
            "No local subscription for Stripe event"
        );
        return Ok(());
    };

    let status = if *event_type == EventType::CustomerSubscriptionDeleted {
        SubscriptionStatus::Canceled
    } else {
        map_subscription_status(stripe_sub.status)
    };

    let mut active: subscription::ActiveModel = local.into();
    active.status = Set(status);
    active.trial_end = Set(stripe_sub.trial_end.and_then(naive_from_timestamp));
    active.current_period_end = Set(naive_from_timestamp(stripe_sub.current_period_end));
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    active.update(&state.db).await?;

    tracing::info!(
        stripe_subscription_id = %stripe_subscription_id,
        event_type = %event_type,
        "Subscription updated from Stripe event"
    );

    Ok(())
}
