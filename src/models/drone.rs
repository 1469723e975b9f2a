use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "drone_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DroneStatus {
    Idle,
    Patrolling,
    Charging,
    Maintenance,
}

impl DroneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DroneStatus::Idle => "idle",
            DroneStatus::Patrolling => "patrolling",
            DroneStatus::Charging => "charging",
            DroneStatus::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Drone {
    pub id: Uuid,
    pub name: String,
    pub model: Option<String>,
    pub status: DroneStatus,
    pub battery_level: i32,
    pub last_patrol_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateDroneData {
    pub name: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DronePatrol {
    pub id: Uuid,
    pub drone_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub issues_detected: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl DronePatrol {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}
