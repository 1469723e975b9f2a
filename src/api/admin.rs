use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::error::Result;
use crate::models::{
    profile::UserWithRole,
    role::{AppRole, RoleAssignment},
};
use crate::services::{
    admin::{self, AdminStats},
    subscriptions::{self, SubscriptionOverview},
};

#[derive(Deserialize)]
struct RoleBody {
    role: AppRole,
}

async fn list_users(State(state): State<AppState>, session: Session) -> Result<Json<Vec<UserWithRole>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(admin::list_users(state.store.as_ref(), actor).await?))
}

async fn change_role(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<Uuid>,
    Json(body): Json<RoleBody>,
) -> Result<Json<RoleAssignment>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        admin::change_user_role(state.store.as_ref(), actor, user_id, body.role).await?,
    ))
}

async fn stats(State(state): State<AppState>, session: Session) -> Result<Json<AdminStats>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(admin::dashboard_stats(state.store.as_ref(), actor).await?))
}

async fn subscription_overview(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SubscriptionOverview>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        subscriptions::subscription_overview(state.store.as_ref(), actor).await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/role", patch(change_role))
        .route("/api/admin/stats", get(stats))
        .route("/api/admin/subscriptions", get(subscription_overview))
}
