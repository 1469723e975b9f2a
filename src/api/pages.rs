use askama::Template;
use axum::{extract::State, routing::get, Router};

use crate::api::middleware::session::AppState;
use crate::error::Result;
use crate::models::subscription::SubscriptionPlan;
use crate::services::subscriptions;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    plans: Vec<SubscriptionPlan>,
}

/// Public landing page
async fn index(State(state): State<AppState>) -> Result<IndexTemplate> {
    let plans = subscriptions::list_active_plans(state.store.as_ref()).await?;
    Ok(IndexTemplate { plans })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}
