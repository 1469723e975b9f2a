use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::db::{PromoCodeStore, Store, StoreError, SubscriptionStore};
use crate::models::{
    role::Actor,
    subscription::{
        CreateLoyaltyCardData, CreateSubscriptionData, LoyaltyCard, PaymentStatus,
        SubscriptionOverviewRow, SubscriptionPlan, UserSubscription,
    },
};
use crate::services::promo::{self, random_code, PromoError};
use crate::services::qr_generator::{generate_qr_png, generate_qr_svg, qr_data_uri, QrGenerationError};

pub const CARD_NUMBER_PREFIX: &str = "CONN";
const CARD_SUFFIX_LEN: usize = 9;
const CARD_NUMBER_ATTEMPTS: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum SubscriptionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error(transparent)]
    Qr(#[from] QrGenerationError),

    #[error("{0}")]
    Validation(String),

    #[error("Plan not found")]
    PlanNotFound,

    #[error("This plan is no longer offered")]
    PlanInactive,

    #[error("Promo code can no longer be redeemed")]
    PromoNoLongerValid,

    #[error("Loyalty card not found")]
    CardNotFound,

    #[error("Only admins can do this")]
    AdminOnly,
}

/// Simulated card payment. Fields are only checked for presence.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentForm {
    pub card_number: String,
    pub card_holder: String,
    pub expiry: String,
    pub cvv: String,
}

impl PaymentForm {
    fn validate(&self) -> Result<(), SubscriptionError> {
        let fields = [
            ("card number", &self.card_number),
            ("card holder", &self.card_holder),
            ("expiry date", &self.expiry),
            ("CVV", &self.cvv),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(SubscriptionError::Validation(format!(
                "Payment {} is required",
                name
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub plan_name: String,
    pub subscription: UserSubscription,
    pub card: LoyaltyCard,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOverview {
    pub subscriptions: Vec<SubscriptionOverviewRow>,
    pub total_revenue: Decimal,
    pub active_count: usize,
    pub month_revenue: Decimal,
    pub month_count: usize,
}

pub fn generate_card_number(now: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        CARD_NUMBER_PREFIX,
        now.timestamp_millis(),
        random_code(CARD_SUFFIX_LEN)
    )
}

pub async fn list_active_plans(store: &dyn Store) -> Result<Vec<SubscriptionPlan>, SubscriptionError> {
    Ok(store.list_active_plans().await?)
}

/// Runs the simulated checkout: payment delay, subscription, promo
/// redemption, then the loyalty card. Steps already written are kept if a
/// later one fails.
#[tracing::instrument(skip(store, payment, payment_delay), fields(actor = %actor.user_id))]
pub async fn purchase_subscription(
    store: &dyn Store,
    actor: Actor,
    plan_id: Uuid,
    promo_code: Option<&str>,
    payment: PaymentForm,
    payment_delay: Duration,
) -> Result<PurchaseReceipt, SubscriptionError> {
    payment.validate()?;

    let plan = store
        .find_plan(plan_id)
        .await?
        .ok_or(SubscriptionError::PlanNotFound)?;
    if !plan.is_active {
        return Err(SubscriptionError::PlanInactive);
    }

    let quote = match promo_code.filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(promo::apply_promo_code(store, code, &plan).await?),
        None => None,
    };
    let amount_paid = quote.as_ref().map_or(plan.price, |q| q.final_price);

    tokio::time::sleep(payment_delay).await;

    let now = Utc::now();
    let subscription = store
        .insert_subscription(CreateSubscriptionData {
            user_id: actor.user_id,
            plan_id: plan.id,
            promo_code_id: quote.as_ref().map(|q| q.promo.id),
            amount_paid,
            start_date: now,
            end_date: now + ChronoDuration::days(i64::from(plan.duration_days)),
            payment_status: PaymentStatus::Paid,
        })
        .await?;

    if let Some(quote) = &quote {
        if store.redeem_promo_code(quote.promo.id, now).await?.is_none() {
            tracing::warn!(
                subscription_id = %subscription.id,
                code = %quote.promo.code,
                "Promo code ran out between quote and redemption"
            );
            return Err(SubscriptionError::PromoNoLongerValid);
        }
    }

    let card = issue_card(store, &subscription).await?;

    tracing::info!(
        subscription_id = %subscription.id,
        card_number = %card.card_number,
        amount_paid = %amount_paid,
        "Subscription purchased"
    );

    Ok(PurchaseReceipt {
        plan_name: plan.name,
        subscription,
        card,
    })
}

async fn issue_card(
    store: &dyn Store,
    subscription: &UserSubscription,
) -> Result<LoyaltyCard, SubscriptionError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let issued_at = Utc::now();
        let card_number = generate_card_number(issued_at);
        let qr_code = qr_data_uri(&card_number)?;

        let result = store
            .insert_loyalty_card(CreateLoyaltyCardData {
                user_id: subscription.user_id,
                subscription_id: subscription.id,
                card_number,
                qr_code,
                issued_at,
                expires_at: subscription.end_date,
            })
            .await;

        match result {
            Err(StoreError::Duplicate(_)) if attempt < CARD_NUMBER_ATTEMPTS => {
                tracing::warn!(attempt, "Card number collision, regenerating");
            }
            other => return Ok(other?),
        }
    }
}

pub async fn list_my_cards(store: &dyn Store, actor: Actor) -> Result<Vec<LoyaltyCard>, SubscriptionError> {
    Ok(store.list_loyalty_cards_for_user(actor.user_id).await?)
}

pub async fn list_my_subscriptions(
    store: &dyn Store,
    actor: Actor,
) -> Result<Vec<UserSubscription>, SubscriptionError> {
    Ok(store.list_subscriptions_for_user(actor.user_id).await?)
}

/// Someone else's card reads as missing.
pub async fn find_my_card(
    store: &dyn Store,
    actor: Actor,
    card_id: Uuid,
) -> Result<LoyaltyCard, SubscriptionError> {
    store
        .find_loyalty_card(card_id)
        .await?
        .filter(|card| card.user_id == actor.user_id)
        .ok_or(SubscriptionError::CardNotFound)
}

pub async fn card_qr_svg(
    store: &dyn Store,
    actor: Actor,
    card_id: Uuid,
) -> Result<String, SubscriptionError> {
    let card = find_my_card(store, actor, card_id).await?;
    Ok(generate_qr_svg(&card.card_number)?)
}

pub async fn card_qr_png(
    store: &dyn Store,
    actor: Actor,
    card_id: Uuid,
) -> Result<Vec<u8>, SubscriptionError> {
    let card = find_my_card(store, actor, card_id).await?;
    Ok(generate_qr_png(&card.card_number)?)
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

pub async fn subscription_overview(
    store: &dyn Store,
    actor: Actor,
) -> Result<SubscriptionOverview, SubscriptionError> {
    if !actor.is_admin() {
        return Err(SubscriptionError::AdminOnly);
    }

    let subscriptions = store.list_subscription_overview().await?;
    let now = Utc::now();

    let paid = || {
        subscriptions
            .iter()
            .filter(|s| s.payment_status == PaymentStatus::Paid)
    };
    let total_revenue: Decimal = paid().map(|s| s.amount_paid).sum();
    let month_revenue: Decimal = paid()
        .filter(|s| same_month(s.created_at, now))
        .map(|s| s.amount_paid)
        .sum();
    let active_count = subscriptions.iter().filter(|s| s.is_active).count();
    let month_count = subscriptions
        .iter()
        .filter(|s| same_month(s.created_at, now))
        .count();

    Ok(SubscriptionOverview {
        subscriptions,
        total_revenue,
        active_count,
        month_revenue,
        month_count,
    })
}
