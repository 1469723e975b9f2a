use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::db::{AlertStore, StoreResult};
use crate::models::alert::{Alert, AlertUpdate, AlertVisibility, CreateAlertData};

#[async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(&self, data: CreateAlertData) -> StoreResult<Alert> {
        let alert = sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (title, description, type, latitude, longitude, status, created_by)
            VALUES ($1, $2, $3, $4, $5, 'open', $6)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.alert_type)
        .bind(data.location.latitude)
        .bind(data.location.longitude)
        .bind(data.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(alert)
    }

    async fn find_alert(&self, id: Uuid) -> StoreResult<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(
            r#"
            SELECT * FROM alerts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(alert)
    }

    async fn list_alerts(&self, visibility: AlertVisibility) -> StoreResult<Vec<Alert>> {
        let alerts = match visibility {
            AlertVisibility::All => {
                sqlx::query_as::<_, Alert>(
                    r#"
                    SELECT * FROM alerts ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
            AlertVisibility::AssignedToOrUnassigned(user_id) => {
                sqlx::query_as::<_, Alert>(
                    r#"
                    SELECT * FROM alerts
                    WHERE assigned_to = $1 OR assigned_to IS NULL
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(alerts)
    }

    async fn apply_alert_update(
        &self,
        id: Uuid,
        update: &AlertUpdate,
    ) -> StoreResult<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(
            r#"
            UPDATE alerts
            SET status = $4, assigned_to = $5, resolved_at = COALESCE($6, resolved_at)
            WHERE id = $1
              AND status = $2
              AND assigned_to IS NOT DISTINCT FROM $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.expected_status)
        .bind(update.expected_assignee)
        .bind(update.status)
        .bind(update.assigned_to)
        .bind(update.resolved_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(alert)
    }
}
