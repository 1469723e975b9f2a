use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::PgStore;
use crate::db::{ResourceStore, StoreResult};
use crate::models::resource::{Coordinate, Resource, ResourceDetails, ResourceKind};

// One row shape covers all four tables; variant columns come back NULL
// where a table does not have them.
#[derive(Debug, FromRow)]
struct ResourceRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    is_available: bool,
    power_kw: Option<f64>,
    capacity: Option<i32>,
    model: Option<String>,
    battery_capacity: Option<f64>,
    range_km: Option<i32>,
    year: Option<i32>,
    created_at: DateTime<Utc>,
}

impl ResourceRow {
    fn into_resource(self, kind: ResourceKind) -> Resource {
        let details = match kind {
            ResourceKind::Parking => ResourceDetails::Parking,
            ResourceKind::ChargingStation => ResourceDetails::ChargingStation {
                power_kw: self.power_kw,
            },
            ResourceKind::RevisionSpace => ResourceDetails::RevisionSpace {
                capacity: self.capacity,
            },
            ResourceKind::ElectricVehicle => ResourceDetails::ElectricVehicle {
                model: self.model.unwrap_or_default(),
                battery_capacity: self.battery_capacity,
                range_km: self.range_km,
                year: self.year,
            },
        };

        Resource {
            id: self.id,
            name: self.name,
            description: self.description,
            location: Coordinate::new(self.latitude, self.longitude),
            is_available: self.is_available,
            details,
            created_at: self.created_at,
        }
    }
}

fn select_clause(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Parking => {
            r#"
            SELECT id, name, description, latitude, longitude, is_available,
                   NULL::DOUBLE PRECISION AS power_kw, NULL::INTEGER AS capacity,
                   NULL::TEXT AS model, NULL::DOUBLE PRECISION AS battery_capacity,
                   NULL::INTEGER AS range_km, NULL::INTEGER AS year, created_at
            FROM parking_spots
            "#
        }
        ResourceKind::ChargingStation => {
            r#"
            SELECT id, name, description, latitude, longitude, is_available,
                   power_kw, NULL::INTEGER AS capacity,
                   NULL::TEXT AS model, NULL::DOUBLE PRECISION AS battery_capacity,
                   NULL::INTEGER AS range_km, NULL::INTEGER AS year, created_at
            FROM charging_stations
            "#
        }
        ResourceKind::RevisionSpace => {
            r#"
            SELECT id, name, description, latitude, longitude, is_available,
                   NULL::DOUBLE PRECISION AS power_kw, capacity,
                   NULL::TEXT AS model, NULL::DOUBLE PRECISION AS battery_capacity,
                   NULL::INTEGER AS range_km, NULL::INTEGER AS year, created_at
            FROM revision_spaces
            "#
        }
        ResourceKind::ElectricVehicle => {
            r#"
            SELECT id, name, NULL::TEXT AS description, latitude, longitude, is_available,
                   NULL::DOUBLE PRECISION AS power_kw, NULL::INTEGER AS capacity,
                   model, battery_capacity, range_km, year, created_at
            FROM electric_vehicles
            "#
        }
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        available_only: bool,
    ) -> StoreResult<Vec<Resource>> {
        let query = format!(
            "{} WHERE ($1 = FALSE OR is_available = TRUE) ORDER BY name ASC",
            select_clause(kind)
        );

        let rows = sqlx::query_as::<_, ResourceRow>(&query)
            .bind(available_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_resource(kind)).collect())
    }

    async fn find_resource(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<Resource>> {
        let query = format!("{} WHERE id = $1", select_clause(kind));

        let row = sqlx::query_as::<_, ResourceRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_resource(kind)))
    }
}
