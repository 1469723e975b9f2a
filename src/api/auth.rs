use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::{
    auth::current_actor,
    session::{AppState, SESSION_KEY_SIGNED_IN_AT, SESSION_KEY_USER_ID},
};
use crate::error::{AppError, Result};
use crate::services::auth::{self, Me, SignUpRequest};

#[derive(Deserialize)]
struct SignUpBody {
    email: String,
    password: String,
    full_name: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize)]
struct SignInBody {
    email: String,
    password: String,
}

async fn start_session(session: &Session, user_id: uuid::Uuid) -> Result<()> {
    // New id on every sign-in so a pre-auth cookie cannot be reused
    session.cycle_id().await?;
    session.insert(SESSION_KEY_USER_ID, user_id).await?;
    session.insert(SESSION_KEY_SIGNED_IN_AT, Utc::now()).await?;
    Ok(())
}

/// Creates an account with the client role and signs it in
async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SignUpBody>,
) -> Result<(StatusCode, Json<Me>)> {
    let me = auth::sign_up(
        state.store.as_ref(),
        SignUpRequest {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            phone: body.phone,
        },
    )
    .await?;

    start_session(&session, me.profile.id).await?;

    Ok((StatusCode::CREATED, Json(me)))
}

async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SignInBody>,
) -> Result<Json<Me>> {
    let profile = auth::sign_in(state.store.as_ref(), &body.email, &body.password).await?;
    start_session(&session, profile.id).await?;

    let actor = current_actor(&state, &session).await?;
    let me = auth::me(state.store.as_ref(), actor)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(me))
}

async fn sign_out(session: Session) -> Result<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, session: Session) -> Result<Json<Me>> {
    let actor = current_actor(&state, &session).await?;
    let me = auth::me(state.store.as_ref(), actor)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(me))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/signout", post(sign_out))
        .route("/api/auth/me", get(me))
}
