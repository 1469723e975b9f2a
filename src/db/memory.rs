//! In-memory data store for development runs and tests

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    AlertStore, DroneStore, IdentityStore, PromoCodeStore, ReservationStore, ResourceStore,
    SettledReservations, Store, StoreError, StoreResult, SubscriptionStore,
};
use crate::models::{
    alert::{Alert, AlertStatus, AlertUpdate, AlertVisibility, CreateAlertData},
    drone::{CreateDroneData, Drone, DronePatrol, DroneStatus},
    profile::{CreateProfileData, Profile},
    promo_code::{CreatePromoCodeData, PromoCode},
    reservation::{CreateReservationData, Reservation, ReservationStatus},
    resource::{Coordinate, Resource, ResourceDetails, ResourceKind},
    role::{AppRole, RoleAssignment},
    subscription::{
        CreateLoyaltyCardData, CreateSubscriptionData, LoyaltyCard, SubscriptionOverviewRow,
        SubscriptionPlan, UserSubscription,
    },
};

/// Same semantics as `PgStore`, held in `DashMap`s.
pub struct MemoryStore {
    profiles: DashMap<Uuid, Profile>,
    roles: DashMap<Uuid, RoleAssignment>,
    resources: DashMap<Uuid, Resource>,
    reservations: DashMap<Uuid, Reservation>,
    alerts: DashMap<Uuid, Alert>,
    drones: DashMap<Uuid, Drone>,
    patrols: DashMap<Uuid, DronePatrol>,
    promo_codes: DashMap<Uuid, PromoCode>,
    plans: DashMap<Uuid, SubscriptionPlan>,
    subscriptions: DashMap<Uuid, UserSubscription>,
    cards: DashMap<Uuid, LoyaltyCard>,
    // Guards check-then-insert sequences (unique keys, booking overlap).
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
            roles: DashMap::new(),
            resources: DashMap::new(),
            reservations: DashMap::new(),
            alerts: DashMap::new(),
            drones: DashMap::new(),
            patrols: DashMap::new(),
            promo_codes: DashMap::new(),
            plans: DashMap::new(),
            subscriptions: DashMap::new(),
            cards: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// A store holding the same plans and resources as the seed migration.
    pub fn seeded() -> Self {
        let store = Self::new();

        store.insert_plan(plan(
            "Event Pass",
            "Unlimited access for a single day",
            Decimal::new(990, 2),
            1,
            Some(5),
            &["Priority parking near venues"],
        ));
        store.insert_plan(plan(
            "Resident",
            "Monthly access for city residents",
            Decimal::new(2990, 2),
            30,
            Some(40),
            &["Reserved charging slots", "Vehicle sharing"],
        ));
        store.insert_plan(plan(
            "Commercial",
            "Yearly plan for shops and cafes",
            Decimal::new(29900, 2),
            365,
            None,
            &["Unlimited reservations", "Dedicated support"],
        ));

        store.insert_resource(resource(
            "Parking Hotel de Ville",
            48.8566,
            2.3522,
            ResourceDetails::Parking,
        ));
        store.insert_resource(resource(
            "Parking Bastille",
            48.8532,
            2.3691,
            ResourceDetails::Parking,
        ));
        store.insert_resource(resource(
            "Borne Rivoli",
            48.8606,
            2.3376,
            ResourceDetails::ChargingStation {
                power_kw: Some(50.0),
            },
        ));
        store.insert_resource(resource(
            "Borne Republique",
            48.8674,
            2.3636,
            ResourceDetails::ChargingStation {
                power_kw: Some(22.0),
            },
        ));
        store.insert_resource(resource(
            "Bibliotheque Marais",
            48.8575,
            2.3622,
            ResourceDetails::RevisionSpace { capacity: Some(30) },
        ));
        store.insert_resource(resource(
            "City Car 01",
            48.8584,
            2.2945,
            ResourceDetails::ElectricVehicle {
                model: "Renault Zoe".to_string(),
                battery_capacity: Some(52.0),
                range_km: Some(390),
                year: Some(2022),
            },
        ));
        store.insert_resource(resource(
            "City Van 01",
            48.8462,
            2.3464,
            ResourceDetails::ElectricVehicle {
                model: "Kangoo E-Tech".to_string(),
                battery_capacity: Some(45.0),
                range_km: Some(285),
                year: Some(2023),
            },
        ));

        store
    }

    pub fn insert_resource(&self, resource: Resource) {
        self.resources.insert(resource.id, resource);
    }

    pub fn insert_plan(&self, plan: SubscriptionPlan) {
        self.plans.insert(plan.id, plan);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned lock only means another writer panicked; the maps are still usable.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn plan(
    name: &str,
    description: &str,
    price: Decimal,
    duration_days: i32,
    max_reservations: Option<i32>,
    features: &[&str],
) -> SubscriptionPlan {
    SubscriptionPlan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: Some(description.to_string()),
        price,
        duration_days,
        includes_parking: true,
        includes_charging: true,
        includes_vehicles: duration_days >= 30,
        includes_revision: duration_days >= 365,
        max_reservations,
        features: Some(serde_json::json!(features)),
        is_active: true,
        created_at: Utc::now(),
    }
}

fn resource(name: &str, latitude: f64, longitude: f64, details: ResourceDetails) -> Resource {
    Resource {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        location: Coordinate::new(latitude, longitude),
        is_available: true,
        details,
        created_at: Utc::now(),
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_profile(&self, data: CreateProfileData) -> StoreResult<Profile> {
        let _guard = self.lock();
        if self.profiles.iter().any(|p| p.email == data.email) {
            return Err(StoreError::Duplicate("email"));
        }
        let profile = Profile {
            id: Uuid::new_v4(),
            email: data.email,
            full_name: data.full_name,
            phone: data.phone,
            password_hash: data.password_hash,
            created_at: Utc::now(),
        };
        self.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.profiles.get(&id).map(|p| p.clone()))
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.email == email)
            .map(|p| p.clone()))
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let profiles = self.profiles.iter().map(|p| p.clone()).collect();
        Ok(newest_first(profiles, |p| p.created_at))
    }

    async fn list_roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AppRole>> {
        Ok(self
            .roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.role)
            .collect())
    }

    async fn list_role_assignments(&self) -> StoreResult<Vec<RoleAssignment>> {
        Ok(self.roles.iter().map(|r| r.clone()).collect())
    }

    async fn add_role(&self, user_id: Uuid, role: AppRole) -> StoreResult<RoleAssignment> {
        let _guard = self.lock();
        if self
            .roles
            .iter()
            .any(|r| r.user_id == user_id && r.role == role)
        {
            return Err(StoreError::Duplicate("role assignment"));
        }
        let assignment = RoleAssignment {
            id: Uuid::new_v4(),
            user_id,
            role,
            created_at: Utc::now(),
        };
        self.roles.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn replace_roles(&self, user_id: Uuid, role: AppRole) -> StoreResult<RoleAssignment> {
        let _guard = self.lock();
        self.roles.retain(|_, r| r.user_id != user_id);
        let assignment = RoleAssignment {
            id: Uuid::new_v4(),
            user_id,
            role,
            created_at: Utc::now(),
        };
        self.roles.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        available_only: bool,
    ) -> StoreResult<Vec<Resource>> {
        let mut resources: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| r.kind() == kind && (!available_only || r.is_available))
            .map(|r| r.clone())
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn find_resource(&self, kind: ResourceKind, id: Uuid) -> StoreResult<Option<Resource>> {
        Ok(self
            .resources
            .get(&id)
            .filter(|r| r.kind() == kind)
            .map(|r| r.clone()))
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn insert_reservation_if_free(
        &self,
        data: CreateReservationData,
    ) -> StoreResult<Option<Reservation>> {
        let _guard = self.lock();
        let taken = self.reservations.iter().any(|r| {
            r.resource_type == data.resource_type
                && r.resource_id == data.resource_id
                && r.status.blocks_resource()
                && r.overlaps(data.start_time, data.end_time)
        });
        if taken {
            return Ok(None);
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            resource_type: data.resource_type,
            resource_id: data.resource_id,
            start_time: data.start_time,
            end_time: data.end_time,
            status: ReservationStatus::Pending,
            created_at: Utc::now(),
        };
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(Some(reservation))
    }

    async fn find_reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn list_reservations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let reservations = self
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        Ok(newest_first(reservations, |r| r.created_at))
    }

    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let reservations = self.reservations.iter().map(|r| r.clone()).collect();
        Ok(newest_first(reservations, |r| r.created_at))
    }

    async fn update_reservation_status(
        &self,
        id: Uuid,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> StoreResult<Option<Reservation>> {
        Ok(self.reservations.get_mut(&id).and_then(|mut r| {
            if r.status != expected {
                return None;
            }
            r.status = next;
            Some(r.clone())
        }))
    }

    async fn settle_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<SettledReservations> {
        let mut settled = SettledReservations::default();
        for mut r in self.reservations.iter_mut() {
            if r.end_time > now {
                continue;
            }
            match r.status {
                ReservationStatus::Confirmed => {
                    r.status = ReservationStatus::Completed;
                    settled.completed += 1;
                }
                ReservationStatus::Pending => {
                    r.status = ReservationStatus::Cancelled;
                    settled.cancelled += 1;
                }
                _ => {}
            }
        }
        Ok(settled)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, data: CreateAlertData) -> StoreResult<Alert> {
        let alert = Alert {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            alert_type: data.alert_type,
            latitude: data.location.latitude,
            longitude: data.location.longitude,
            status: AlertStatus::Open,
            assigned_to: None,
            created_by: data.created_by,
            resolved_at: None,
            created_at: Utc::now(),
        };
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn find_alert(&self, id: Uuid) -> StoreResult<Option<Alert>> {
        Ok(self.alerts.get(&id).map(|a| a.clone()))
    }

    async fn list_alerts(&self, visibility: AlertVisibility) -> StoreResult<Vec<Alert>> {
        let alerts = self
            .alerts
            .iter()
            .filter(|a| visibility.admits(a))
            .map(|a| a.clone())
            .collect();
        Ok(newest_first(alerts, |a| a.created_at))
    }

    async fn apply_alert_update(
        &self,
        id: Uuid,
        update: &AlertUpdate,
    ) -> StoreResult<Option<Alert>> {
        Ok(self.alerts.get_mut(&id).and_then(|mut a| {
            if !update.matches(&a) {
                return None;
            }
            a.status = update.status;
            a.assigned_to = update.assigned_to;
            if update.resolved_at.is_some() {
                a.resolved_at = update.resolved_at;
            }
            Some(a.clone())
        }))
    }
}

#[async_trait]
impl DroneStore for MemoryStore {
    async fn insert_drone(&self, data: CreateDroneData) -> StoreResult<Drone> {
        let drone = Drone {
            id: Uuid::new_v4(),
            name: data.name,
            model: data.model,
            status: DroneStatus::Idle,
            battery_level: 100,
            last_patrol_at: None,
            created_at: Utc::now(),
        };
        self.drones.insert(drone.id, drone.clone());
        Ok(drone)
    }

    async fn find_drone(&self, id: Uuid) -> StoreResult<Option<Drone>> {
        Ok(self.drones.get(&id).map(|d| d.clone()))
    }

    async fn list_drones(&self) -> StoreResult<Vec<Drone>> {
        let drones = self.drones.iter().map(|d| d.clone()).collect();
        Ok(newest_first(drones, |d| d.created_at))
    }

    async fn delete_drone(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.drones.remove(&id).is_some();
        if removed {
            self.patrols.retain(|_, p| p.drone_id != id);
        }
        Ok(removed)
    }

    async fn begin_patrol(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Drone>> {
        Ok(self.drones.get_mut(&id).and_then(|mut d| {
            if d.status != DroneStatus::Idle {
                return None;
            }
            d.status = DroneStatus::Patrolling;
            d.last_patrol_at = Some(now);
            Some(d.clone())
        }))
    }

    async fn set_drone_status(&self, id: Uuid, status: DroneStatus) -> StoreResult<Option<Drone>> {
        Ok(self.drones.get_mut(&id).map(|mut d| {
            d.status = status;
            d.clone()
        }))
    }

    async fn insert_patrol(
        &self,
        drone_id: Uuid,
        start_time: DateTime<Utc>,
    ) -> StoreResult<DronePatrol> {
        let patrol = DronePatrol {
            id: Uuid::new_v4(),
            drone_id,
            start_time,
            end_time: None,
            issues_detected: None,
            created_at: Utc::now(),
        };
        self.patrols.insert(patrol.id, patrol.clone());
        Ok(patrol)
    }

    async fn close_patrol(
        &self,
        patrol_id: Uuid,
        issues_detected: i32,
        end_time: DateTime<Utc>,
    ) -> StoreResult<Option<DronePatrol>> {
        Ok(self.patrols.get_mut(&patrol_id).and_then(|mut p| {
            if !p.is_open() {
                return None;
            }
            p.issues_detected = Some(issues_detected);
            p.end_time = Some(end_time);
            Some(p.clone())
        }))
    }

    async fn find_open_patrol(&self, drone_id: Uuid) -> StoreResult<Option<DronePatrol>> {
        Ok(self
            .patrols
            .iter()
            .filter(|p| p.drone_id == drone_id && p.is_open())
            .max_by_key(|p| p.start_time)
            .map(|p| p.clone()))
    }

    async fn list_patrols(&self, drone_id: Uuid) -> StoreResult<Vec<DronePatrol>> {
        let patrols = self
            .patrols
            .iter()
            .filter(|p| p.drone_id == drone_id)
            .map(|p| p.clone())
            .collect();
        Ok(newest_first(patrols, |p| p.start_time))
    }
}

#[async_trait]
impl PromoCodeStore for MemoryStore {
    async fn insert_promo_code(&self, data: CreatePromoCodeData) -> StoreResult<PromoCode> {
        let _guard = self.lock();
        if self.promo_codes.iter().any(|p| p.code == data.code) {
            return Err(StoreError::Duplicate("promo code"));
        }
        let promo = PromoCode {
            id: Uuid::new_v4(),
            code: data.code,
            discount_type: data.discount_type,
            discount_value: data.discount_value,
            max_uses: data.max_uses,
            current_uses: 0,
            valid_until: data.valid_until,
            is_active: true,
            created_at: Utc::now(),
        };
        self.promo_codes.insert(promo.id, promo.clone());
        Ok(promo)
    }

    async fn find_promo_code(&self, id: Uuid) -> StoreResult<Option<PromoCode>> {
        Ok(self.promo_codes.get(&id).map(|p| p.clone()))
    }

    async fn find_active_promo_code(&self, code: &str) -> StoreResult<Option<PromoCode>> {
        Ok(self
            .promo_codes
            .iter()
            .find(|p| p.code == code && p.is_active)
            .map(|p| p.clone()))
    }

    async fn list_promo_codes(&self) -> StoreResult<Vec<PromoCode>> {
        let promos = self.promo_codes.iter().map(|p| p.clone()).collect();
        Ok(newest_first(promos, |p| p.created_at))
    }

    async fn set_promo_code_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> StoreResult<Option<PromoCode>> {
        Ok(self.promo_codes.get_mut(&id).map(|mut p| {
            p.is_active = is_active;
            p.clone()
        }))
    }

    async fn delete_promo_code(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.promo_codes.remove(&id).is_some())
    }

    async fn redeem_promo_code(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PromoCode>> {
        Ok(self.promo_codes.get_mut(&id).and_then(|mut p| {
            p.check_redeemable(now).ok()?;
            p.current_uses += 1;
            Some(p.clone())
        }))
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn list_active_plans(&self) -> StoreResult<Vec<SubscriptionPlan>> {
        let mut plans: Vec<SubscriptionPlan> = self
            .plans
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.clone())
            .collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(plans)
    }

    async fn find_plan(&self, id: Uuid) -> StoreResult<Option<SubscriptionPlan>> {
        Ok(self.plans.get(&id).map(|p| p.clone()))
    }

    async fn insert_subscription(
        &self,
        data: CreateSubscriptionData,
    ) -> StoreResult<UserSubscription> {
        let subscription = UserSubscription {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            plan_id: data.plan_id,
            promo_code_id: data.promo_code_id,
            amount_paid: data.amount_paid,
            start_date: data.start_date,
            end_date: data.end_date,
            payment_status: data.payment_status,
            is_active: true,
            auto_renew: false,
            created_at: Utc::now(),
        };
        self.subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn list_subscriptions_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<UserSubscription>> {
        let subscriptions = self
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.clone())
            .collect();
        Ok(newest_first(subscriptions, |s| s.created_at))
    }

    async fn list_subscription_overview(&self) -> StoreResult<Vec<SubscriptionOverviewRow>> {
        let rows = self
            .subscriptions
            .iter()
            .filter_map(|s| {
                let plan = self.plans.get(&s.plan_id)?;
                let profile = self.profiles.get(&s.user_id);
                Some(SubscriptionOverviewRow {
                    id: s.id,
                    user_id: s.user_id,
                    plan_name: plan.name.clone(),
                    plan_price: plan.price,
                    amount_paid: s.amount_paid,
                    subscriber_email: profile.as_ref().map(|p| p.email.clone()),
                    subscriber_name: profile.as_ref().and_then(|p| p.full_name.clone()),
                    start_date: s.start_date,
                    end_date: s.end_date,
                    payment_status: s.payment_status,
                    is_active: s.is_active,
                    created_at: s.created_at,
                })
            })
            .collect();
        Ok(newest_first(rows, |r| r.created_at))
    }

    async fn insert_loyalty_card(&self, data: CreateLoyaltyCardData) -> StoreResult<LoyaltyCard> {
        let _guard = self.lock();
        if self.cards.iter().any(|c| c.card_number == data.card_number) {
            return Err(StoreError::Duplicate("card number"));
        }
        let card = LoyaltyCard {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            subscription_id: data.subscription_id,
            card_number: data.card_number,
            qr_code: data.qr_code,
            issued_at: data.issued_at,
            expires_at: data.expires_at,
            is_active: true,
        };
        self.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn find_loyalty_card(&self, id: Uuid) -> StoreResult<Option<LoyaltyCard>> {
        Ok(self.cards.get(&id).map(|c| c.clone()))
    }

    async fn list_loyalty_cards_for_user(&self, user_id: Uuid) -> StoreResult<Vec<LoyaltyCard>> {
        let cards = self
            .cards
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.clone())
            .collect();
        Ok(newest_first(cards, |c| c.issued_at))
    }

    async fn expire_subscriptions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut expired = 0;
        for mut s in self.subscriptions.iter_mut() {
            if s.is_active && s.end_date <= now {
                s.is_active = false;
                expired += 1;
            }
        }
        for mut c in self.cards.iter_mut() {
            if c.is_active && c.expires_at <= now {
                c.is_active = false;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_overlapping_reservation_is_refused() {
        let store = MemoryStore::seeded();
        let spot = store
            .list_resources(ResourceKind::Parking, true)
            .await
            .unwrap()
            .remove(0);
        let now = Utc::now();

        let first = store
            .insert_reservation_if_free(CreateReservationData::starting_at(
                Uuid::new_v4(),
                ResourceKind::Parking,
                spot.id,
                now,
            ))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .insert_reservation_if_free(CreateReservationData::starting_at(
                Uuid::new_v4(),
                ResourceKind::Parking,
                spot.id,
                now + Duration::minutes(30),
            ))
            .await
            .unwrap();
        assert!(second.is_none());

        let later = store
            .insert_reservation_if_free(CreateReservationData::starting_at(
                Uuid::new_v4(),
                ResourceKind::Parking,
                spot.id,
                now + Duration::hours(2),
            ))
            .await
            .unwrap();
        assert!(later.is_some());
    }

    #[tokio::test]
    async fn test_redeem_stops_at_max_uses() {
        let store = MemoryStore::new();
        let promo = store
            .insert_promo_code(CreatePromoCodeData {
                code: "ONCE".to_string(),
                discount_type: crate::models::promo_code::DiscountType::Fixed,
                discount_value: Decimal::new(5, 0),
                max_uses: Some(1),
                valid_until: None,
            })
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.redeem_promo_code(promo.id, now).await.unwrap().is_some());
        assert!(store.redeem_promo_code(promo.id, now).await.unwrap().is_none());
        let stored = store.find_promo_code(promo.id).await.unwrap().unwrap();
        assert_eq!(stored.current_uses, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let data = CreateProfileData {
            email: "a@example.com".to_string(),
            full_name: None,
            phone: None,
            password_hash: "x".to_string(),
        };
        store.create_profile(data.clone()).await.unwrap();
        let err = store.create_profile(data).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
    }

    #[tokio::test]
    async fn test_settle_expired_reservations() {
        let store = MemoryStore::seeded();
        let spot = store
            .list_resources(ResourceKind::Parking, true)
            .await
            .unwrap()
            .remove(0);
        let past = Utc::now() - Duration::hours(5);
        let pending = store
            .insert_reservation_if_free(CreateReservationData::starting_at(
                Uuid::new_v4(),
                ResourceKind::Parking,
                spot.id,
                past,
            ))
            .await
            .unwrap()
            .unwrap();

        let settled = store.settle_expired_reservations(Utc::now()).await.unwrap();
        assert_eq!(settled, SettledReservations { completed: 0, cancelled: 1 });
        let stored = store.find_reservation(pending.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
    }
}
