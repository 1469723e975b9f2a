use axum::{extract::FromRef, Router};
use ring::digest;
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use tower_sessions::{cookie::Key, Expiry, SessionManagerLayer, SessionStore};

use crate::config::Config;
use crate::db::Store;
use crate::services::{drone_patrol::PatrolSimulator, image_analysis::ImageAnalyzer};

/// Session keys used in the application
pub const SESSION_KEY_USER_ID: &str = "user_id";
pub const SESSION_KEY_SIGNED_IN_AT: &str = "signed_in_at";

const SESSION_INACTIVITY_HOURS: i64 = 24;

/// Wraps `router` in a session layer backed by `store`. Cookies are signed
/// with a key derived from the session secret.
pub fn with_sessions<S>(router: Router, store: S, session_secret: &Secret<String>, secure: bool) -> Router
where
    S: SessionStore + Clone,
{
    // cookie::Key wants 64 bytes of key material
    let key_material = digest::digest(&digest::SHA512, session_secret.expose_secret().as_bytes());
    let key = Key::from(key_material.as_ref());

    let session_layer = SessionManagerLayer::new(store)
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            SESSION_INACTIVITY_HOURS,
        )))
        .with_signed(key);

    router.layer(session_layer)
}

/// Shared handles every handler can reach
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub patrols: PatrolSimulator,
    pub analyzer: Arc<dyn ImageAnalyzer>,
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Arc<dyn Store> {
        state.store.clone()
    }
}

impl FromRef<AppState> for PatrolSimulator {
    fn from_ref(state: &AppState) -> PatrolSimulator {
        state.patrols.clone()
    }
}
