use async_trait::async_trait;
use sqlx::PgPool;

use super::{Store, StoreError, StoreResult};

mod alerts;
mod drones;
mod identity;
mod promo_codes;
mod reservations;
mod resources;
mod subscriptions;

/// PostgreSQL-backed data store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation onto `StoreError::Duplicate`.
pub(crate) fn unique_violation(what: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Duplicate(what)
        }
        _ => StoreError::Database(e),
    }
}
