use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{unique_violation, PgStore};
use crate::db::{StoreResult, SubscriptionStore};
use crate::models::subscription::{
    CreateLoyaltyCardData, CreateSubscriptionData, LoyaltyCard, SubscriptionOverviewRow,
    SubscriptionPlan, UserSubscription,
};

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn list_active_plans(&self) -> StoreResult<Vec<SubscriptionPlan>> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            SELECT * FROM subscription_plans
            WHERE is_active = TRUE
            ORDER BY price ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    async fn find_plan(&self, id: Uuid) -> StoreResult<Option<SubscriptionPlan>> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            SELECT * FROM subscription_plans WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn insert_subscription(
        &self,
        data: CreateSubscriptionData,
    ) -> StoreResult<UserSubscription> {
        let subscription = sqlx::query_as::<_, UserSubscription>(
            r#"
            INSERT INTO user_subscriptions
                (user_id, plan_id, promo_code_id, amount_paid, start_date, end_date,
                 payment_status, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.plan_id)
        .bind(data.promo_code_id)
        .bind(data.amount_paid)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.payment_status)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn list_subscriptions_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<UserSubscription>> {
        let subscriptions = sqlx::query_as::<_, UserSubscription>(
            r#"
            SELECT * FROM user_subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn list_subscription_overview(&self) -> StoreResult<Vec<SubscriptionOverviewRow>> {
        let rows = sqlx::query_as::<_, SubscriptionOverviewRow>(
            r#"
            SELECT
                s.id,
                s.user_id,
                sp.name AS plan_name,
                sp.price AS plan_price,
                s.amount_paid,
                p.email AS subscriber_email,
                p.full_name AS subscriber_name,
                s.start_date,
                s.end_date,
                s.payment_status,
                s.is_active,
                s.created_at
            FROM user_subscriptions s
            INNER JOIN subscription_plans sp ON sp.id = s.plan_id
            LEFT JOIN profiles p ON p.id = s.user_id
            ORDER BY s.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_loyalty_card(&self, data: CreateLoyaltyCardData) -> StoreResult<LoyaltyCard> {
        let card = sqlx::query_as::<_, LoyaltyCard>(
            r#"
            INSERT INTO loyalty_cards
                (user_id, subscription_id, card_number, qr_code, issued_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.subscription_id)
        .bind(&data.card_number)
        .bind(&data.qr_code)
        .bind(data.issued_at)
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("card number"))?;

        Ok(card)
    }

    async fn find_loyalty_card(&self, id: Uuid) -> StoreResult<Option<LoyaltyCard>> {
        let card = sqlx::query_as::<_, LoyaltyCard>(
            r#"
            SELECT * FROM loyalty_cards WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn list_loyalty_cards_for_user(&self, user_id: Uuid) -> StoreResult<Vec<LoyaltyCard>> {
        let cards = sqlx::query_as::<_, LoyaltyCard>(
            r#"
            SELECT * FROM loyalty_cards
            WHERE user_id = $1
            ORDER BY issued_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn expire_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET is_active = FALSE
            WHERE is_active = TRUE AND end_date <= $1
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE loyalty_cards
            SET is_active = FALSE
            WHERE is_active = TRUE AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(expired)
    }
}
