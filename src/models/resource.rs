use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservable resource tag, stored as the `resource_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Parking,
    ChargingStation,
    RevisionSpace,
    ElectricVehicle,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Parking,
        ResourceKind::ChargingStation,
        ResourceKind::RevisionSpace,
        ResourceKind::ElectricVehicle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Parking => "parking",
            ResourceKind::ChargingStation => "charging_station",
            ResourceKind::RevisionSpace => "revision_space",
            ResourceKind::ElectricVehicle => "electric_vehicle",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Variant-specific attributes of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceDetails {
    Parking,
    ChargingStation {
        power_kw: Option<f64>,
    },
    RevisionSpace {
        capacity: Option<i32>,
    },
    ElectricVehicle {
        model: String,
        battery_capacity: Option<f64>,
        range_km: Option<i32>,
        year: Option<i32>,
    },
}

impl ResourceDetails {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDetails::Parking => ResourceKind::Parking,
            ResourceDetails::ChargingStation { .. } => ResourceKind::ChargingStation,
            ResourceDetails::RevisionSpace { .. } => ResourceKind::RevisionSpace,
            ResourceDetails::ElectricVehicle { .. } => ResourceKind::ElectricVehicle,
        }
    }
}

/// A parking spot, charging station, revision space or electric vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Coordinate,
    pub is_available: bool,
    pub details: ResourceDetails,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        self.details.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_report_their_kind() {
        assert_eq!(ResourceDetails::Parking.kind(), ResourceKind::Parking);
        assert_eq!(
            ResourceDetails::ChargingStation { power_kw: Some(22.0) }.kind(),
            ResourceKind::ChargingStation
        );
        assert_eq!(
            ResourceDetails::ElectricVehicle {
                model: "Zoe".to_string(),
                battery_capacity: None,
                range_km: Some(390),
                year: Some(2022),
            }
            .kind(),
            ResourceKind::ElectricVehicle
        );
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(48.85, 2.35).is_valid());
        assert!(!Coordinate::new(91.0, 2.35).is_valid());
        assert!(!Coordinate::new(48.85, -181.0).is_valid());
    }

    #[test]
    fn test_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&ResourceKind::ChargingStation).unwrap();
        assert_eq!(json, "\"charging_station\"");
    }
}
