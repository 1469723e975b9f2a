use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::db::{DroneStore, StoreResult};
use crate::models::drone::{CreateDroneData, Drone, DronePatrol, DroneStatus};

#[async_trait]
impl DroneStore for PgStore {
    async fn insert_drone(&self, data: CreateDroneData) -> StoreResult<Drone> {
        let drone = sqlx::query_as::<_, Drone>(
            r#"
            INSERT INTO drones (name, model, status, battery_level)
            VALUES ($1, $2, 'idle', 100)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.model)
        .fetch_one(&self.pool)
        .await?;

        Ok(drone)
    }

    async fn find_drone(&self, id: Uuid) -> StoreResult<Option<Drone>> {
        let drone = sqlx::query_as::<_, Drone>(
            r#"
            SELECT * FROM drones WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drone)
    }

    async fn list_drones(&self) -> StoreResult<Vec<Drone>> {
        let drones = sqlx::query_as::<_, Drone>(
            r#"
            SELECT * FROM drones ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drones)
    }

    async fn delete_drone(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM drones WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_patrol(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Drone>> {
        let drone = sqlx::query_as::<_, Drone>(
            r#"
            UPDATE drones
            SET status = 'patrolling', last_patrol_at = $2
            WHERE id = $1 AND status = 'idle'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drone)
    }

    async fn set_drone_status(&self, id: Uuid, status: DroneStatus) -> StoreResult<Option<Drone>> {
        let drone = sqlx::query_as::<_, Drone>(
            r#"
            UPDATE drones SET status = $2 WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drone)
    }

    async fn insert_patrol(
        &self,
        drone_id: Uuid,
        start_time: DateTime<Utc>,
    ) -> StoreResult<DronePatrol> {
        let patrol = sqlx::query_as::<_, DronePatrol>(
            r#"
            INSERT INTO drone_patrols (drone_id, start_time)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(drone_id)
        .bind(start_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(patrol)
    }

    async fn close_patrol(
        &self,
        patrol_id: Uuid,
        issues_detected: i32,
        end_time: DateTime<Utc>,
    ) -> StoreResult<Option<DronePatrol>> {
        let patrol = sqlx::query_as::<_, DronePatrol>(
            r#"
            UPDATE drone_patrols
            SET issues_detected = $2, end_time = $3
            WHERE id = $1 AND end_time IS NULL
            RETURNING *
            "#,
        )
        .bind(patrol_id)
        .bind(issues_detected)
        .bind(end_time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patrol)
    }

    async fn find_open_patrol(&self, drone_id: Uuid) -> StoreResult<Option<DronePatrol>> {
        let patrol = sqlx::query_as::<_, DronePatrol>(
            r#"
            SELECT * FROM drone_patrols
            WHERE drone_id = $1 AND end_time IS NULL
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(drone_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patrol)
    }

    async fn list_patrols(&self, drone_id: Uuid) -> StoreResult<Vec<DronePatrol>> {
        let patrols = sqlx::query_as::<_, DronePatrol>(
            r#"
            SELECT * FROM drone_patrols
            WHERE drone_id = $1
            ORDER BY start_time DESC
            "#,
        )
        .bind(drone_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(patrols)
    }
}
