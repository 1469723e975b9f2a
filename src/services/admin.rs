use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{AlertStore, IdentityStore, ReservationStore, Store, StoreError};
use crate::models::{
    alert::{AlertStatus, AlertVisibility},
    profile::UserWithRole,
    reservation::ReservationStatus,
    role::{effective_role, Actor, AppRole, RoleAssignment},
};

#[derive(thiserror::Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Only admins can do this")]
    AdminOnly,

    #[error("User not found")]
    UserNotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_users: usize,
    pub workers: usize,
    pub clients: usize,
    pub active_alerts: usize,
    pub pending_reservations: usize,
}

fn require_admin(actor: Actor) -> Result<(), AdminError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AdminError::AdminOnly)
    }
}

async fn roles_by_user(store: &dyn Store) -> Result<HashMap<Uuid, Vec<AppRole>>, StoreError> {
    let mut by_user: HashMap<Uuid, Vec<AppRole>> = HashMap::new();
    for RoleAssignment { user_id, role, .. } in store.list_role_assignments().await? {
        by_user.entry(user_id).or_default().push(role);
    }
    Ok(by_user)
}

/// Every profile with its effective role, newest first.
pub async fn list_users(store: &dyn Store, actor: Actor) -> Result<Vec<UserWithRole>, AdminError> {
    require_admin(actor)?;

    let roles = roles_by_user(store).await?;
    let users = store
        .list_profiles()
        .await?
        .into_iter()
        .map(|p| UserWithRole {
            role: effective_role(roles.get(&p.id).into_iter().flatten()),
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            phone: p.phone,
            created_at: p.created_at,
        })
        .collect();

    Ok(users)
}

/// Replaces every role row of the user with exactly `role`.
#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn change_user_role(
    store: &dyn Store,
    actor: Actor,
    user_id: Uuid,
    role: AppRole,
) -> Result<RoleAssignment, AdminError> {
    require_admin(actor)?;

    store
        .find_profile(user_id)
        .await?
        .ok_or(AdminError::UserNotFound)?;

    let assignment = store.replace_roles(user_id, role).await?;

    tracing::info!(user_id = %user_id, role = %role, "User role changed");

    Ok(assignment)
}

pub async fn dashboard_stats(store: &dyn Store, actor: Actor) -> Result<AdminStats, AdminError> {
    let users = list_users(store, actor).await?;

    let active_alerts = store
        .list_alerts(AlertVisibility::All)
        .await?
        .iter()
        .filter(|a| a.status != AlertStatus::Resolved)
        .count();

    let pending_reservations = store
        .list_reservations()
        .await?
        .iter()
        .filter(|r| r.status == ReservationStatus::Pending)
        .count();

    Ok(AdminStats {
        total_users: users.len(),
        workers: users.iter().filter(|u| u.role == AppRole::Worker).count(),
        clients: users.iter().filter(|u| u.role == AppRole::Client).count(),
        active_alerts,
        pending_reservations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::profile::CreateProfileData;

    async fn user(store: &MemoryStore, email: &str, role: AppRole) -> Uuid {
        let profile = store
            .create_profile(CreateProfileData {
                email: email.to_string(),
                full_name: None,
                phone: None,
                password_hash: String::new(),
            })
            .await
            .unwrap();
        store.add_role(profile.id, role).await.unwrap();
        profile.id
    }

    #[tokio::test]
    async fn test_change_role_replaces_all_rows() {
        let store = MemoryStore::new();
        let admin_id = user(&store, "admin@city.fr", AppRole::Admin).await;
        let target = user(&store, "w@city.fr", AppRole::Client).await;
        store.add_role(target, AppRole::Worker).await.unwrap();

        let admin = Actor::new(admin_id, AppRole::Admin);
        change_user_role(&store, admin, target, AppRole::Client)
            .await
            .unwrap();

        assert_eq!(
            store.list_roles_for_user(target).await.unwrap(),
            vec![AppRole::Client]
        );

        let users = list_users(&store, admin).await.unwrap();
        let listed = users.iter().find(|u| u.id == target).unwrap();
        assert_eq!(listed.role, AppRole::Client);
    }

    #[tokio::test]
    async fn test_stats_and_admin_gate() {
        let store = MemoryStore::new();
        let admin_id = user(&store, "admin@city.fr", AppRole::Admin).await;
        user(&store, "w1@city.fr", AppRole::Worker).await;
        user(&store, "c1@city.fr", AppRole::Client).await;
        user(&store, "c2@city.fr", AppRole::Client).await;

        let stats = dashboard_stats(&store, Actor::new(admin_id, AppRole::Admin))
            .await
            .unwrap();
        assert_eq!(
            stats,
            AdminStats {
                total_users: 4,
                workers: 1,
                clients: 2,
                active_alerts: 0,
                pending_reservations: 0,
            }
        );

        let worker = Actor::new(Uuid::new_v4(), AppRole::Worker);
        assert!(matches!(
            dashboard_stats(&store, worker).await,
            Err(AdminError::AdminOnly)
        ));
        assert!(matches!(
            change_user_role(&store, Actor::new(admin_id, AppRole::Admin), Uuid::new_v4(), AppRole::Worker).await,
            Err(AdminError::UserNotFound)
        ));
    }
}
