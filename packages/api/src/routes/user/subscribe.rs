use std::collections::HashMap;

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use woofadaar_types::anyhow;

use crate::{
    config::PlanInterval,
    coupons::{ApplyOutcome, ApplyRequest, apply_coupon},
    error::ApiError,
    middleware::jwt::AppUser,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub plan_id: String,
    pub coupon_code: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub checkout_url: String,
    pub session_id: String,
    pub original_amount: i64,
    pub final_amount: i64,
    pub discount_amount: i64,
    pub trial_days: u32,
}

fn parse_currency(raw: &str) -> Result<stripe::Currency, ApiError> {
    match raw.to_lowercase().as_str() {
        "inr" => Ok(stripe::Currency::INR),
        "eur" => Ok(stripe::Currency::EUR),
        "usd" => Ok(stripe::Currency::USD),
        other => Err(ApiError::from(anyhow!("Unsupported currency: {}", other))),
    }
}

/// POST /user/subscribe
///
/// Creates a Stripe checkout session for a catalog plan. A coupon code is
/// redeemed through the coupon engine before the Stripe round trip, so the
/// ledger row exists once the session does; trial-extension coupons add days
/// to the plan's trial instead of discounting.
#[utoipa::path(
    post,
    path = "/user/subscribe",
    tag = "user",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Stripe checkout session created", body = SubscribeResponse),
        (status = 400, description = "Unknown plan or rejected coupon"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[tracing::instrument(name = "POST /user/subscribe", skip(state, user, request))]
pub async fn create_subscription_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AppUser>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let stripe_client = state.require_stripe()?;

    let db_user = user.get_user(&state).await?;
    let stripe_id = db_user
        .stripe_id
        .ok_or_else(|| anyhow!("User does not have a Stripe customer ID"))?;

    let plan_id = request.plan_id.to_uppercase();
    let plan = state
        .platform_config
        .plan(&plan_id)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid plan: {}", request.plan_id)))?;

    let mut final_amount = plan.price;
    let mut discount_amount = 0;
    let mut trial_days = plan.trial_days;
    let mut coupon_usage_id: Option<String> = None;

    if let Some(code) = &request.coupon_code {
        let outcome = apply_coupon(
            &state.db,
            ApplyRequest {
                code: code.clone(),
                user_id: db_user.id.clone(),
                order_amount: plan.price,
                order_id: None,
                subscription_id: None,
                plan_id: Some(plan_id.clone()),
            },
        )
        .await?;

        match outcome {
            ApplyOutcome::Applied(applied) => {
                final_amount = applied.breakdown.final_amount;
                discount_amount = applied.breakdown.discount_amount;
                if let Some(extra) = applied.breakdown.trial_extension_days {
                    trial_days += extra.max(0) as u32;
                }
                coupon_usage_id = Some(applied.usage.id);
            }
            ApplyOutcome::Rejected(rejection) => {
                return Err(ApiError::bad_request(rejection.message()));
            }
        }
    }

    let customer_id: stripe::CustomerId = stripe_id
        .parse()
        .map_err(|e| anyhow!("Invalid Stripe customer ID for user {}: {}", db_user.id, e))?;

    let currency = parse_currency(&plan.currency)?;
    let interval = match plan.interval {
        PlanInterval::Month => stripe::CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
        PlanInterval::Year => stripe::CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Year,
    };

    let mut metadata = HashMap::new();
    metadata.insert("type".to_string(), "subscription".to_string());
    metadata.insert("user_id".to_string(), db_user.id.clone());
    metadata.insert("plan_id".to_string(), plan_id.clone());
    if let Some(usage_id) = &coupon_usage_id {
        metadata.insert("coupon_usage_id".to_string(), usage_id.clone());
    }

    let client_ref = format!("subscription:{}:{}", db_user.id, plan_id);

    let mut params = stripe::CreateCheckoutSession::new();
    params.success_url = Some(&request.success_url);
    params.cancel_url = Some(&request.cancel_url);
    params.mode = Some(stripe::CheckoutSessionMode::Subscription);
    params.customer = Some(customer_id);
    params.client_reference_id = Some(&client_ref);

    let line_item = stripe::CreateCheckoutSessionLineItems {
        price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
            currency,
            product_data: Some(
                stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: plan.name.clone(),
                    description: Some(format!("{} subscription", plan.name)),
                    ..Default::default()
                },
            ),
            recurring: Some(stripe::CreateCheckoutSessionLineItemsPriceDataRecurring {
                interval,
                interval_count: None,
            }),
            unit_amount: Some(final_amount),
            ..Default::default()
        }),
        quantity: Some(1),
        ..Default::default()
    };
    params.line_items = Some(vec![line_item]);
    params.metadata = Some(metadata);

    if trial_days > 0 {
        params.subscription_data = Some(stripe::CreateCheckoutSessionSubscriptionData {
            trial_period_days: Some(trial_days),
            ..Default::default()
        });
    }

    let session = stripe::CheckoutSession::create(stripe_client, params)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create Stripe checkout session");
            anyhow!("Failed to create checkout session: {}", e)
        })?;

    tracing::info!(
        user_id = %db_user.id,
        plan_id = %plan_id,
        session_id = %session.id,
        discount_amount,
        "Created subscription checkout session"
    );

    Ok(Json(SubscribeResponse {
        checkout_url: session.url.unwrap_or_default(),
        session_id: session.id.to_string(),
        original_amount: plan.price,
        final_amount,
        discount_amount,
        trial_days,
    }))
}
