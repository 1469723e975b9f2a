use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::db::{ReservationStore, SettledReservations, Store, StoreError, SubscriptionStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceStats {
    pub completed_reservations: u64,
    pub cancelled_reservations: u64,
    pub expired_subscriptions: u64,
}

/// One maintenance pass:
/// 1. Complete confirmed reservations whose window has ended
/// 2. Cancel pending reservations whose window has ended
/// 3. Deactivate subscriptions and loyalty cards past their end date
pub async fn run_maintenance(store: &dyn Store, now: DateTime<Utc>) -> Result<MaintenanceStats, StoreError> {
    let SettledReservations {
        completed,
        cancelled,
    } = store.settle_expired_reservations(now).await?;

    let expired_subscriptions = store.expire_subscriptions(now).await?;

    let stats = MaintenanceStats {
        completed_reservations: completed,
        cancelled_reservations: cancelled,
        expired_subscriptions,
    };

    tracing::info!(?stats, "Maintenance pass completed");

    Ok(stats)
}

/// Schedules `run_maintenance` on `cron` (six fields, seconds first) and
/// starts the scheduler.
pub async fn start_scheduler(store: Arc<dyn Store>, cron: &str) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let store = store.clone();
        Box::pin(async move {
            if let Err(e) = run_maintenance(store.as_ref(), Utc::now()).await {
                tracing::error!(error = %e, "Maintenance pass failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron = %cron, "Maintenance job scheduled");

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{IdentityStore, MemoryStore, ResourceStore};
    use crate::models::{
        profile::CreateProfileData,
        reservation::{CreateReservationData, ReservationStatus},
        resource::ResourceKind,
        role::{Actor, AppRole},
    };
    use crate::services::subscriptions::{purchase_subscription, PaymentForm};
    use chrono::Duration;

    #[tokio::test]
    async fn test_maintenance_settles_and_expires() {
        let store = MemoryStore::seeded();
        let profile = store
            .create_profile(CreateProfileData {
                email: "ada@city.fr".to_string(),
                full_name: None,
                phone: None,
                password_hash: String::new(),
            })
            .await
            .unwrap();
        let actor = Actor::new(profile.id, AppRole::Client);

        let parking = store.list_resources(ResourceKind::Parking, true).await.unwrap();
        let yesterday = Utc::now() - Duration::days(1);
        let confirmed = store
            .insert_reservation_if_free(CreateReservationData::starting_at(
                actor.user_id,
                ResourceKind::Parking,
                parking[0].id,
                yesterday,
            ))
            .await
            .unwrap()
            .unwrap();
        store
            .update_reservation_status(confirmed.id, ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await
            .unwrap();
        store
            .insert_reservation_if_free(CreateReservationData::starting_at(
                actor.user_id,
                ResourceKind::Parking,
                parking[1].id,
                yesterday,
            ))
            .await
            .unwrap()
            .unwrap();

        let plan = store.list_active_plans().await.unwrap().remove(0);
        let payment = PaymentForm {
            card_number: "4242".to_string(),
            card_holder: "Ada".to_string(),
            expiry: "12/30".to_string(),
            cvv: "123".to_string(),
        };
        let receipt = purchase_subscription(&store, actor, plan.id, None, payment, std::time::Duration::ZERO)
            .await
            .unwrap();

        // Nothing due yet for the subscription
        let now = Utc::now();
        let stats = run_maintenance(&store, now).await.unwrap();
        assert_eq!(
            stats,
            MaintenanceStats {
                completed_reservations: 1,
                cancelled_reservations: 1,
                expired_subscriptions: 0,
            }
        );

        let later = receipt.subscription.end_date + Duration::minutes(1);
        let stats = run_maintenance(&store, later).await.unwrap();
        assert_eq!(stats.expired_subscriptions, 1);

        let cards = store.list_loyalty_cards_for_user(actor.user_id).await.unwrap();
        assert!(!cards[0].is_active);
        let subscriptions = store.list_subscriptions_for_user(actor.user_id).await.unwrap();
        assert!(!subscriptions[0].is_active);
    }
}
