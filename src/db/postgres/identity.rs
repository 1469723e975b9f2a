use async_trait::async_trait;
use uuid::Uuid;

use super::{unique_violation, PgStore};
use crate::db::{IdentityStore, StoreResult};
use crate::models::{
    profile::{CreateProfileData, Profile},
    role::{AppRole, RoleAssignment},
};

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_profile(&self, data: CreateProfileData) -> StoreResult<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (email, full_name, phone, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.full_name)
        .bind(&data.phone)
        .bind(&data.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("email"))?;

        Ok(profile)
    }

    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn list_roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AppRole>> {
        let roles = sqlx::query_scalar::<_, AppRole>(
            r#"
            SELECT role FROM user_roles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn list_role_assignments(&self) -> StoreResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT * FROM user_roles ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn add_role(&self, user_id: Uuid, role: AppRole) -> StoreResult<RoleAssignment> {
        let row = sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO user_roles (user_id, role)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("role"))?;

        Ok(row)
    }

    async fn replace_roles(&self, user_id: Uuid, role: AppRole) -> StoreResult<RoleAssignment> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM user_roles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO user_roles (user_id, role)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row)
    }
}
