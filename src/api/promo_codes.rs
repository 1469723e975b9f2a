use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::db::SubscriptionStore;
use crate::error::{AppError, Result};
use crate::models::promo_code::{DiscountType, PromoCode};
use crate::services::promo::{self, NewPromoCode, PromoQuote};

#[derive(Deserialize)]
struct ApplyBody {
    code: String,
    plan_id: Uuid,
}

#[derive(Deserialize)]
struct NewPromoBody {
    code: String,
    discount_type: DiscountType,
    discount_value: Decimal,
    max_uses: Option<i32>,
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct GeneratedCode {
    code: String,
}

/// Prices a plan with a promo code, without redeeming it
async fn apply_code(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ApplyBody>,
) -> Result<Json<PromoQuote>> {
    current_actor(&state, &session).await?;

    let plan = state
        .store
        .find_plan(body.plan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))?;

    Ok(Json(
        promo::apply_promo_code(state.store.as_ref(), &body.code, &plan).await?,
    ))
}

async fn list_codes(State(state): State<AppState>, session: Session) -> Result<Json<Vec<PromoCode>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(promo::list_promo_codes(state.store.as_ref(), actor).await?))
}

async fn create_code(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NewPromoBody>,
) -> Result<(StatusCode, Json<PromoCode>)> {
    let actor = current_actor(&state, &session).await?;
    let promo = promo::create_promo_code(
        state.store.as_ref(),
        actor,
        NewPromoCode {
            code: body.code,
            discount_type: body.discount_type,
            discount_value: body.discount_value,
            max_uses: body.max_uses,
            valid_until: body.valid_until,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(promo)))
}

async fn generate_code(State(state): State<AppState>, session: Session) -> Result<Json<GeneratedCode>> {
    let actor = current_actor(&state, &session).await?;
    if !actor.is_admin() {
        return Err(AppError::Forbidden("Only admins can manage promo codes".to_string()));
    }
    Ok(Json(GeneratedCode {
        code: promo::generate_code(),
    }))
}

async fn toggle_code(
    State(state): State<AppState>,
    session: Session,
    Path(promo_id): Path<Uuid>,
) -> Result<Json<PromoCode>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        promo::toggle_promo_code(state.store.as_ref(), actor, promo_id).await?,
    ))
}

async fn delete_code(
    State(state): State<AppState>,
    session: Session,
    Path(promo_id): Path<Uuid>,
) -> Result<StatusCode> {
    let actor = current_actor(&state, &session).await?;
    promo::delete_promo_code(state.store.as_ref(), actor, promo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/promo-codes", get(list_codes).post(create_code))
        .route("/api/promo-codes/apply", post(apply_code))
        .route("/api/promo-codes/generate", get(generate_code))
        .route("/api/promo-codes/:id/toggle", post(toggle_code))
        .route("/api/promo-codes/:id", delete(delete_code))
}
