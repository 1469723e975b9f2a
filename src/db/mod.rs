use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    alert::{Alert, AlertUpdate, AlertVisibility, CreateAlertData},
    drone::{CreateDroneData, Drone, DronePatrol, DroneStatus},
    profile::{CreateProfileData, Profile},
    promo_code::{CreatePromoCodeData, PromoCode},
    reservation::{CreateReservationData, Reservation, ReservationStatus},
    resource::{Resource, ResourceKind},
    role::{AppRole, RoleAssignment},
    subscription::{
        CreateLoyaltyCardData, CreateSubscriptionData, LoyaltyCard, SubscriptionOverviewRow,
        SubscriptionPlan, UserSubscription,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate {0}")]
    Duplicate(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of the periodic reservation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettledReservations {
    pub completed: u64,
    pub cancelled: u64,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_profile(&self, data: CreateProfileData) -> StoreResult<Profile>;
    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;
    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>>;
    async fn list_profiles(&self) -> StoreResult<Vec<Profile>>;
    async fn list_roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AppRole>>;
    async fn list_role_assignments(&self) -> StoreResult<Vec<RoleAssignment>>;
    async fn add_role(&self, user_id: Uuid, role: AppRole) -> StoreResult<RoleAssignment>;
    /// Drops every role row of the user, then inserts `role`.
    async fn replace_roles(&self, user_id: Uuid, role: AppRole) -> StoreResult<RoleAssignment>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        available_only: bool,
    ) -> StoreResult<Vec<Resource>>;
    async fn find_resource(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<Resource>>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Inserts a pending reservation unless a pending or confirmed one on the
    /// same resource overlaps the window. `None` means the slot is taken.
    async fn insert_reservation_if_free(
        &self,
        data: CreateReservationData,
    ) -> StoreResult<Option<Reservation>>;
    async fn find_reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>>;
    async fn list_reservations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>>;
    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>>;
    /// Compare-and-set on status. `None` when the row is missing or moved on.
    async fn update_reservation_status(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> StoreResult<Option<Reservation>>;
    /// Completes confirmed and cancels pending reservations that ended before `now`.
    async fn settle_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<SettledReservations>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, data: CreateAlertData) -> StoreResult<Alert>;
    async fn find_alert(&self, id: Uuid) -> StoreResult<Option<Alert>>;
    /// Newest first.
    async fn list_alerts(&self, visibility: AlertVisibility) -> StoreResult<Vec<Alert>>;
    /// Applies the update only if the row still matches its expectations.
    async fn apply_alert_update(&self, id: Uuid, update: &AlertUpdate)
        -> StoreResult<Option<Alert>>;
}

#[async_trait]
pub trait DroneStore: Send + Sync {
    async fn insert_drone(&self, data: CreateDroneData) -> StoreResult<Drone>;
    async fn find_drone(&self, id: Uuid) -> StoreResult<Option<Drone>>;
    async fn list_drones(&self) -> StoreResult<Vec<Drone>>;
    async fn delete_drone(&self, id: Uuid) -> StoreResult<bool>;
    /// Moves an idle drone to patrolling. `None` if missing or not idle.
    async fn begin_patrol(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Drone>>;
    async fn set_drone_status(&self, id: Uuid, status: DroneStatus) -> StoreResult<Option<Drone>>;
    async fn insert_patrol(&self, drone_id: Uuid, start_time: DateTime<Utc>)
        -> StoreResult<DronePatrol>;
    /// Sets end time and issue count on a patrol that is still open.
    async fn close_patrol(
        &self,
        patrol_id: Uuid,
        issues_detected: i32,
        end_time: DateTime<Utc>,
    ) -> StoreResult<Option<DronePatrol>>;
    async fn find_open_patrol(&self, drone_id: Uuid) -> StoreResult<Option<DronePatrol>>;
    async fn list_patrols(&self, drone_id: Uuid) -> StoreResult<Vec<DronePatrol>>;
}

#[async_trait]
pub trait PromoCodeStore: Send + Sync {
    async fn insert_promo_code(&self, data: CreatePromoCodeData) -> StoreResult<PromoCode>;
    async fn find_promo_code(&self, id: Uuid) -> StoreResult<Option<PromoCode>>;
    async fn find_active_promo_code(&self, code: &str) -> StoreResult<Option<PromoCode>>;
    async fn list_promo_codes(&self) -> StoreResult<Vec<PromoCode>>;
    async fn set_promo_code_active(&self, id: Uuid, is_active: bool)
        -> StoreResult<Option<PromoCode>>;
    async fn delete_promo_code(&self, id: Uuid) -> StoreResult<bool>;
    /// Atomically bumps `current_uses` if the code is still redeemable at `now`.
    async fn redeem_promo_code(&self, id: Uuid, now: DateTime<Utc>)
        -> StoreResult<Option<PromoCode>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_active_plans(&self) -> StoreResult<Vec<SubscriptionPlan>>;
    async fn find_plan(&self, id: Uuid) -> StoreResult<Option<SubscriptionPlan>>;
    async fn insert_subscription(&self, data: CreateSubscriptionData)
        -> StoreResult<UserSubscription>;
    async fn list_subscriptions_for_user(&self, user_id: Uuid)
        -> StoreResult<Vec<UserSubscription>>;
    async fn list_subscription_overview(&self) -> StoreResult<Vec<SubscriptionOverviewRow>>;
    async fn insert_loyalty_card(&self, data: CreateLoyaltyCardData) -> StoreResult<LoyaltyCard>;
    async fn find_loyalty_card(&self, id: Uuid) -> StoreResult<Option<LoyaltyCard>>;
    async fn list_loyalty_cards_for_user(&self, user_id: Uuid) -> StoreResult<Vec<LoyaltyCard>>;
    /// Deactivates subscriptions and cards past their end date.
    async fn expire_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// The whole data store gateway.
#[async_trait]
pub trait Store:
    IdentityStore
    + ResourceStore
    + ReservationStore
    + AlertStore
    + DroneStore
    + PromoCodeStore
    + SubscriptionStore
{
    async fn ping(&self) -> StoreResult<()>;
}
