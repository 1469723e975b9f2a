use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Application role carried by a user. Stored as the `app_role` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "app_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Client,
    Worker,
    Admin,
}

impl AppRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppRole::Client => "client",
            AppRole::Worker => "worker",
            AppRole::Admin => "admin",
        }
    }

    fn priority(&self) -> u8 {
        match self {
            AppRole::Admin => 2,
            AppRole::Worker => 1,
            AppRole::Client => 0,
        }
    }
}

impl std::fmt::Display for AppRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: AppRole,
    pub created_at: DateTime<Utc>,
}

/// Derives the effective role from the role rows a user holds.
///
/// Admin wins over worker, worker wins over client. A set with neither
/// admin nor worker (including an empty one) yields client; whether an
/// empty set counts as "not loaded yet" is the caller's decision.
pub fn effective_role<'a, I>(roles: I) -> AppRole
where
    I: IntoIterator<Item = &'a AppRole>,
{
    roles
        .into_iter()
        .copied()
        .max_by_key(AppRole::priority)
        .unwrap_or(AppRole::Client)
}

/// The signed-in user a workflow call acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: AppRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: AppRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == AppRole::Admin
    }

    /// Workers and admins handle alerts in the field.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, AppRole::Worker | AppRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_wins_regardless_of_other_roles() {
        assert_eq!(effective_role(&[AppRole::Admin]), AppRole::Admin);
        assert_eq!(
            effective_role(&[AppRole::Client, AppRole::Worker, AppRole::Admin]),
            AppRole::Admin
        );
        assert_eq!(
            effective_role(&[AppRole::Admin, AppRole::Client]),
            AppRole::Admin
        );
    }

    #[test]
    fn test_worker_without_admin_resolves_to_worker() {
        assert_eq!(
            effective_role(&[AppRole::Client, AppRole::Worker]),
            AppRole::Worker
        );
        assert_eq!(
            effective_role(&[AppRole::Worker, AppRole::Worker]),
            AppRole::Worker
        );
    }

    #[test]
    fn test_client_only_resolves_to_client() {
        assert_eq!(effective_role(&[AppRole::Client]), AppRole::Client);
    }

    #[test]
    fn test_empty_set_falls_back_to_client() {
        let roles: Vec<AppRole> = Vec::new();
        assert_eq!(effective_role(&roles), AppRole::Client);
    }
}
