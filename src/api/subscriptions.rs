use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::error::Result;
use crate::models::subscription::{LoyaltyCard, SubscriptionPlan, UserSubscription};
use crate::services::subscriptions::{self, PaymentForm, PurchaseReceipt};

#[derive(Deserialize)]
struct PurchaseBody {
    plan_id: Uuid,
    promo_code: Option<String>,
    payment: PaymentForm,
}

#[derive(Template)]
#[template(path = "card.html")]
struct CardTemplate {
    card: LoyaltyCard,
}

async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(subscriptions::list_active_plans(state.store.as_ref()).await?))
}

/// Simulated checkout. Holds the request for the configured payment delay.
async fn purchase(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<PurchaseBody>,
) -> Result<(StatusCode, Json<PurchaseReceipt>)> {
    let actor = current_actor(&state, &session).await?;
    let receipt = subscriptions::purchase_subscription(
        state.store.as_ref(),
        actor,
        body.plan_id,
        body.promo_code.as_deref(),
        body.payment,
        state.config.payment_delay(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn my_subscriptions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<UserSubscription>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        subscriptions::list_my_subscriptions(state.store.as_ref(), actor).await?,
    ))
}

async fn my_cards(State(state): State<AppState>, session: Session) -> Result<Json<Vec<LoyaltyCard>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(subscriptions::list_my_cards(state.store.as_ref(), actor).await?))
}

async fn card_qr_svg(
    State(state): State<AppState>,
    session: Session,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let actor = current_actor(&state, &session).await?;
    let svg = subscriptions::card_qr_svg(state.store.as_ref(), actor, card_id).await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

async fn card_qr_png(
    State(state): State<AppState>,
    session: Session,
    Path(card_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let actor = current_actor(&state, &session).await?;
    let png = subscriptions::card_qr_png(state.store.as_ref(), actor, card_id).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Printable card page
async fn card_page(
    State(state): State<AppState>,
    session: Session,
    Path(card_id): Path<Uuid>,
) -> Result<CardTemplate> {
    let actor = current_actor(&state, &session).await?;
    let card = subscriptions::find_my_card(state.store.as_ref(), actor, card_id).await?;
    Ok(CardTemplate { card })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/subscriptions", post(purchase))
        .route("/api/subscriptions/mine", get(my_subscriptions))
        .route("/api/cards", get(my_cards))
        .route("/api/cards/:id/qr.svg", get(card_qr_svg))
        .route("/api/cards/:id/qr.png", get(card_qr_png))
        .route("/cards/:id", get(card_page))
}
