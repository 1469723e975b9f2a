use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::db::{ReservationStore, SettledReservations, StoreResult};
use crate::models::reservation::{CreateReservationData, Reservation, ReservationStatus};

#[async_trait]
impl ReservationStore for PgStore {
    async fn insert_reservation_if_free(
        &self,
        data: CreateReservationData,
    ) -> StoreResult<Option<Reservation>> {
        let mut tx = self.pool.begin().await?;

        // Serialize bookings per resource for the rest of the transaction.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(data.resource_id.to_string())
            .execute(&mut *tx)
            .await?;

        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (user_id, resource_type, resource_id, start_time, end_time, status)
            SELECT $1, $2, $3, $4, $5, 'pending'
            WHERE NOT EXISTS (
                SELECT 1 FROM reservations
                WHERE resource_type = $2
                  AND resource_id = $3
                  AND status IN ('pending', 'confirmed')
                  AND start_time < $5
                  AND end_time > $4
            )
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.resource_type)
        .bind(data.resource_id)
        .bind(data.start_time)
        .bind(data.end_time)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    async fn list_reservations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn update_reservation_status(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> StoreResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    async fn settle_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<SettledReservations> {
        let completed = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'completed'
            WHERE status = 'confirmed' AND end_time <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let cancelled = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled'
            WHERE status = 'pending' AND end_time <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(SettledReservations {
            completed,
            cancelled,
        })
    }
}
