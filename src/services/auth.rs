use serde::Serialize;
use uuid::Uuid;

use crate::db::{IdentityStore, Store, StoreError};
use crate::models::{
    profile::{CreateProfileData, Profile},
    role::{effective_role, Actor, AppRole},
};
use crate::services::password::{self, PasswordError};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("A valid email address is required")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("An account already exists for this email")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Profile of the signed-in user together with its resolved role.
#[derive(Debug, Clone, Serialize)]
pub struct Me {
    #[serde(flatten)]
    pub profile: Profile,
    pub role: AppRole,
}

fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidEmail),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Creates a profile and gives it the default client role.
#[tracing::instrument(skip(store, request), fields(email = %request.email))]
pub async fn sign_up(store: &dyn Store, request: SignUpRequest) -> Result<Me, AuthError> {
    let email = normalize_email(&request.email)?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }

    let password_hash = password::hash_password(&request.password)?;

    let profile = store
        .create_profile(CreateProfileData {
            email,
            full_name: non_blank(request.full_name),
            phone: non_blank(request.phone),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => AuthError::EmailTaken,
            other => AuthError::Store(other),
        })?;

    store.add_role(profile.id, AppRole::Client).await?;

    tracing::info!(user_id = %profile.id, "User signed up");

    Ok(Me {
        profile,
        role: AppRole::Client,
    })
}

/// Checks credentials and returns the matching profile.
#[tracing::instrument(skip(store, password))]
pub async fn sign_in(store: &dyn Store, email: &str, password: &str) -> Result<Profile, AuthError> {
    let email = email.trim().to_lowercase();

    let profile = store
        .find_profile_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !password::verify_password(password, &profile.password_hash)? {
        tracing::warn!(user_id = %profile.id, "Rejected sign-in attempt");
        return Err(AuthError::InvalidCredentials);
    }

    tracing::info!(user_id = %profile.id, "User signed in");

    Ok(profile)
}

/// Builds the actor for a signed-in user.
///
/// `None` when the user holds no role rows at all: the role is unresolved
/// and the caller should not guess one.
pub async fn resolve_actor(store: &dyn Store, user_id: Uuid) -> Result<Option<Actor>, StoreError> {
    let roles = store.list_roles_for_user(user_id).await?;
    if roles.is_empty() {
        return Ok(None);
    }
    Ok(Some(Actor::new(user_id, effective_role(&roles))))
}

pub async fn me(store: &dyn Store, actor: Actor) -> Result<Option<Me>, StoreError> {
    Ok(store.find_profile(actor.user_id).await?.map(|profile| Me {
        profile,
        role: actor.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn request(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: Some("  Jeanne Martin ".to_string()),
            phone: Some("".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let store = MemoryStore::new();
        let me = sign_up(&store, request("  Jeanne@Example.COM ", "secret1"))
            .await
            .unwrap();

        assert_eq!(me.profile.email, "jeanne@example.com");
        assert_eq!(me.profile.full_name.as_deref(), Some("Jeanne Martin"));
        assert_eq!(me.profile.phone, None);
        assert_eq!(me.role, AppRole::Client);

        let profile = sign_in(&store, "JEANNE@example.com", "secret1").await.unwrap();
        assert_eq!(profile.id, me.profile.id);

        let actor = resolve_actor(&store, profile.id).await.unwrap().unwrap();
        assert_eq!(actor.role, AppRole::Client);
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let store = MemoryStore::new();
        assert!(matches!(
            sign_up(&store, request("not-an-email", "secret1")).await,
            Err(AuthError::InvalidEmail)
        ));
        assert!(matches!(
            sign_up(&store, request("a@b.fr", "12345")).await,
            Err(AuthError::PasswordTooShort)
        ));

        sign_up(&store, request("a@b.fr", "123456")).await.unwrap();
        assert!(matches!(
            sign_up(&store, request("A@B.fr", "123456")).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let store = MemoryStore::new();
        sign_up(&store, request("a@b.fr", "123456")).await.unwrap();
        assert!(matches!(
            sign_in(&store, "a@b.fr", "1234567").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            sign_in(&store, "nobody@b.fr", "123456").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_user_without_roles_is_unresolved() {
        let store = MemoryStore::new();
        let profile = store
            .create_profile(CreateProfileData {
                email: "x@y.fr".to_string(),
                full_name: None,
                phone: None,
                password_hash: String::new(),
            })
            .await
            .unwrap();

        assert!(resolve_actor(&store, profile.id).await.unwrap().is_none());

        store.add_role(profile.id, AppRole::Worker).await.unwrap();
        store.add_role(profile.id, AppRole::Admin).await.unwrap();
        let actor = resolve_actor(&store, profile.id).await.unwrap().unwrap();
        assert_eq!(actor.role, AppRole::Admin);
    }
}
