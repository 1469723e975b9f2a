use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{unique_violation, PgStore};
use crate::db::{PromoCodeStore, StoreResult};
use crate::models::promo_code::{CreatePromoCodeData, PromoCode};

#[async_trait]
impl PromoCodeStore for PgStore {
    async fn insert_promo_code(&self, data: CreatePromoCodeData) -> StoreResult<PromoCode> {
        let promo = sqlx::query_as::<_, PromoCode>(
            r#"
            INSERT INTO promo_codes (code, discount_type, discount_value, max_uses, valid_until)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.code)
        .bind(data.discount_type)
        .bind(data.discount_value)
        .bind(data.max_uses)
        .bind(data.valid_until)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("promo code"))?;

        Ok(promo)
    }

    async fn find_promo_code(&self, id: Uuid) -> StoreResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(
            r#"
            SELECT * FROM promo_codes WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    async fn find_active_promo_code(&self, code: &str) -> StoreResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(
            r#"
            SELECT * FROM promo_codes WHERE code = $1 AND is_active = TRUE
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    async fn list_promo_codes(&self) -> StoreResult<Vec<PromoCode>> {
        let promos = sqlx::query_as::<_, PromoCode>(
            r#"
            SELECT * FROM promo_codes ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(promos)
    }

    async fn set_promo_code_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> StoreResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(
            r#"
            UPDATE promo_codes SET is_active = $2 WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    async fn delete_promo_code(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM promo_codes WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem_promo_code(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(
            r#"
            UPDATE promo_codes
            SET current_uses = current_uses + 1
            WHERE id = $1
              AND is_active = TRUE
              AND (valid_until IS NULL OR valid_until >= $2)
              AND (max_uses IS NULL OR current_uses < max_uses)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }
}
