use chrono::Utc;
use uuid::Uuid;

use crate::db::{ReservationStore, ResourceStore, Store, StoreError};
use crate::models::{
    reservation::{CreateReservationData, Reservation, ReservationStatus},
    resource::{Resource, ResourceKind},
    role::Actor,
};

#[derive(thiserror::Error, Debug)]
pub enum ReservationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Resource not found")]
    ResourceNotFound,

    #[error("Resource is not available")]
    ResourceUnavailable,

    #[error("Resource is already booked for this time slot")]
    SlotTaken,

    #[error("Reservation not found")]
    NotFound,

    #[error("Only admins can manage reservations")]
    AdminOnly,

    #[error("Cannot move a {from} reservation to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("Reservation was changed by someone else, reload and try again")]
    Conflict,
}

/// Available resources of one kind, or of every kind, ordered by name.
pub async fn list_available_resources(
    store: &dyn Store,
    kind: Option<ResourceKind>,
) -> Result<Vec<Resource>, StoreError> {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => ResourceKind::ALL.to_vec(),
    };

    let mut resources = Vec::new();
    for kind in kinds {
        resources.extend(store.list_resources(kind, true).await?);
    }
    resources.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(resources)
}

/// Books a resource for the fixed window starting now.
#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn create_reservation(
    store: &dyn Store,
    actor: Actor,
    kind: ResourceKind,
    resource_id: Uuid,
) -> Result<Reservation, ReservationError> {
    let resource = store
        .find_resource(kind, resource_id)
        .await?
        .ok_or(ReservationError::ResourceNotFound)?;

    if !resource.is_available {
        return Err(ReservationError::ResourceUnavailable);
    }

    let data = CreateReservationData::starting_at(actor.user_id, kind, resource_id, Utc::now());
    let reservation = store
        .insert_reservation_if_free(data)
        .await?
        .ok_or(ReservationError::SlotTaken)?;

    tracing::info!(
        reservation_id = %reservation.id,
        resource = %resource.name,
        end_time = %reservation.end_time,
        "Reservation created"
    );

    Ok(reservation)
}

pub async fn list_my_reservations(
    store: &dyn Store,
    actor: Actor,
) -> Result<Vec<Reservation>, ReservationError> {
    Ok(store.list_reservations_for_user(actor.user_id).await?)
}

pub async fn list_all_reservations(
    store: &dyn Store,
    actor: Actor,
) -> Result<Vec<Reservation>, ReservationError> {
    if !actor.is_admin() {
        return Err(ReservationError::AdminOnly);
    }
    Ok(store.list_reservations().await?)
}

/// Admin status change, checked against the reservation lifecycle.
#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn update_reservation_status(
    store: &dyn Store,
    actor: Actor,
    reservation_id: Uuid,
    next: ReservationStatus,
) -> Result<Reservation, ReservationError> {
    if !actor.is_admin() {
        return Err(ReservationError::AdminOnly);
    }

    let current = store
        .find_reservation(reservation_id)
        .await?
        .ok_or(ReservationError::NotFound)?;

    commit_status_change(store, &current, next).await
}

/// Moves `current` to `next` if the stored status still matches it.
async fn commit_status_change(
    store: &dyn Store,
    current: &Reservation,
    next: ReservationStatus,
) -> Result<Reservation, ReservationError> {
    if !current.status.can_transition_to(next) {
        return Err(ReservationError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    let updated = store
        .update_reservation_status(current.id, current.status, next)
        .await?
        .ok_or(ReservationError::Conflict)?;

    tracing::info!(from = %current.status, to = %next, "Reservation status updated");

    Ok(updated)
}

pub async fn confirm_reservation(
    store: &dyn Store,
    actor: Actor,
    reservation_id: Uuid,
) -> Result<Reservation, ReservationError> {
    update_reservation_status(store, actor, reservation_id, ReservationStatus::Confirmed).await
}

pub async fn cancel_reservation(
    store: &dyn Store,
    actor: Actor,
    reservation_id: Uuid,
) -> Result<Reservation, ReservationError> {
    update_reservation_status(store, actor, reservation_id, ReservationStatus::Cancelled).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::reservation::RESERVATION_DURATION_HOURS;
    use crate::models::role::AppRole;

    fn client() -> Actor {
        Actor::new(Uuid::new_v4(), AppRole::Client)
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), AppRole::Admin)
    }

    async fn first_of(store: &MemoryStore, kind: ResourceKind) -> Resource {
        list_available_resources(store, Some(kind))
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn test_list_available_resources() {
        let store = MemoryStore::seeded();
        let all = list_available_resources(&store, None).await.unwrap();
        assert_eq!(all.len(), 7);
        assert!(all.windows(2).all(|w| w[0].name <= w[1].name));

        let vehicles = list_available_resources(&store, Some(ResourceKind::ElectricVehicle))
            .await
            .unwrap();
        assert_eq!(vehicles.len(), 2);
    }

    #[tokio::test]
    async fn test_reservation_window_and_status() {
        let store = MemoryStore::seeded();
        let station = first_of(&store, ResourceKind::ChargingStation).await;
        let actor = client();

        let reservation =
            create_reservation(&store, actor, ResourceKind::ChargingStation, station.id)
                .await
                .unwrap();

        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.user_id, actor.user_id);
        assert_eq!(
            reservation.end_time - reservation.start_time,
            chrono::Duration::hours(RESERVATION_DURATION_HOURS)
        );

        let mine = list_my_reservations(&store, actor).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_double_booking_refused() {
        let store = MemoryStore::seeded();
        let spot = first_of(&store, ResourceKind::Parking).await;

        create_reservation(&store, client(), ResourceKind::Parking, spot.id)
            .await
            .unwrap();
        let err = create_reservation(&store, client(), ResourceKind::Parking, spot.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::SlotTaken));
    }

    #[tokio::test]
    async fn test_unknown_or_mismatched_resource() {
        let store = MemoryStore::seeded();
        let spot = first_of(&store, ResourceKind::Parking).await;

        let err = create_reservation(&store, client(), ResourceKind::ElectricVehicle, spot.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::ResourceNotFound));
    }

    #[tokio::test]
    async fn test_admin_lifecycle() {
        let store = MemoryStore::seeded();
        let spot = first_of(&store, ResourceKind::Parking).await;
        let reservation = create_reservation(&store, client(), ResourceKind::Parking, spot.id)
            .await
            .unwrap();

        assert!(matches!(
            confirm_reservation(&store, client(), reservation.id).await,
            Err(ReservationError::AdminOnly)
        ));

        let admin = admin();
        let confirmed = confirm_reservation(&store, admin, reservation.id).await.unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);

        let completed = update_reservation_status(
            &store,
            admin,
            reservation.id,
            ReservationStatus::Completed,
        )
        .await
        .unwrap();
        assert_eq!(completed.status, ReservationStatus::Completed);

        let err = cancel_reservation(&store, admin, reservation.id).await.unwrap_err();
        assert!(matches!(
            err,
            ReservationError::InvalidTransition {
                from: ReservationStatus::Completed,
                to: ReservationStatus::Cancelled
            }
        ));

        assert_eq!(list_all_reservations(&store, admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_change_from_stale_snapshot_is_a_conflict() {
        let store = MemoryStore::seeded();
        let spot = first_of(&store, ResourceKind::Parking).await;
        let reservation = create_reservation(&store, client(), ResourceKind::Parking, spot.id)
            .await
            .unwrap();

        // Read while pending, then confirmed by another admin
        let snapshot = store.find_reservation(reservation.id).await.unwrap().unwrap();
        confirm_reservation(&store, admin(), reservation.id).await.unwrap();

        let err = commit_status_change(&store, &snapshot, ReservationStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::Conflict));

        let stored = store.find_reservation(reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancelled_slot_can_be_booked_again() {
        let store = MemoryStore::seeded();
        let spot = first_of(&store, ResourceKind::Parking).await;
        let first = create_reservation(&store, client(), ResourceKind::Parking, spot.id)
            .await
            .unwrap();
        cancel_reservation(&store, admin(), first.id).await.unwrap();

        create_reservation(&store, client(), ResourceKind::Parking, spot.id)
            .await
            .unwrap();
    }
}
