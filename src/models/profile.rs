use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::AppRole;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProfileData {
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
}

/// Profile joined with its effective role, as listed on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRole {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: AppRole,
    pub created_at: DateTime<Utc>,
}
