use tower_sessions::Session;
use uuid::Uuid;

use super::session::{AppState, SESSION_KEY_USER_ID};
use crate::error::AppError;
use crate::models::role::Actor;
use crate::services::auth;

/// Extracts the signed-in user id from the session
pub async fn get_authenticated_user(session: &Session) -> Result<Uuid, AppError> {
    session
        .get::<Uuid>(SESSION_KEY_USER_ID)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Signed-in user turned into an actor. A user without any role is refused.
pub async fn current_actor(state: &AppState, session: &Session) -> Result<Actor, AppError> {
    let user_id = get_authenticated_user(session).await?;

    auth::resolve_actor(state.store.as_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("No role assigned to this account".to_string()))
}
