use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::error::Result;
use crate::models::{
    reservation::{Reservation, ReservationStatus},
    resource::{Resource, ResourceKind},
};
use crate::services::reservations;

#[derive(Deserialize)]
struct ResourceQuery {
    kind: Option<ResourceKind>,
}

#[derive(Deserialize)]
struct NewReservationBody {
    resource_type: ResourceKind,
    resource_id: Uuid,
}

#[derive(Deserialize)]
struct StatusBody {
    status: ReservationStatus,
}

/// Public catalog of bookable resources
async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Vec<Resource>>> {
    let resources = reservations::list_available_resources(state.store.as_ref(), query.kind).await?;
    Ok(Json(resources))
}

async fn create_reservation(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NewReservationBody>,
) -> Result<(StatusCode, Json<Reservation>)> {
    let actor = current_actor(&state, &session).await?;
    let reservation = reservations::create_reservation(
        state.store.as_ref(),
        actor,
        body.resource_type,
        body.resource_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn my_reservations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Reservation>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        reservations::list_my_reservations(state.store.as_ref(), actor).await?,
    ))
}

async fn all_reservations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Reservation>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        reservations::list_all_reservations(state.store.as_ref(), actor).await?,
    ))
}

async fn update_status(
    State(state): State<AppState>,
    session: Session,
    Path(reservation_id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Reservation>> {
    let actor = current_actor(&state, &session).await?;
    let reservation = reservations::update_reservation_status(
        state.store.as_ref(),
        actor,
        reservation_id,
        body.status,
    )
    .await?;
    Ok(Json(reservation))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/resources", get(list_resources))
        .route(
            "/api/reservations",
            post(create_reservation).get(all_reservations),
        )
        .route("/api/reservations/mine", get(my_reservations))
        .route("/api/reservations/:id/status", patch(update_status))
}
