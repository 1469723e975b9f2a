use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::error::Result;
use crate::models::drone::{Drone, DronePatrol};

#[derive(Deserialize)]
struct NewDroneBody {
    name: String,
    model: Option<String>,
}

async fn list_drones(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Drone>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(state.patrols.list_drones(actor).await?))
}

async fn add_drone(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NewDroneBody>,
) -> Result<(StatusCode, Json<Drone>)> {
    let actor = current_actor(&state, &session).await?;
    let drone = state.patrols.add_drone(actor, &body.name, body.model).await?;
    Ok((StatusCode::CREATED, Json(drone)))
}

async fn delete_drone(
    State(state): State<AppState>,
    session: Session,
    Path(drone_id): Path<Uuid>,
) -> Result<StatusCode> {
    let actor = current_actor(&state, &session).await?;
    state.patrols.delete_drone(actor, drone_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_patrols(
    State(state): State<AppState>,
    session: Session,
    Path(drone_id): Path<Uuid>,
) -> Result<Json<Vec<DronePatrol>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(state.patrols.list_patrols(actor, drone_id).await?))
}

/// Starts a patrol; detection runs later in the background
async fn start_patrol(
    State(state): State<AppState>,
    session: Session,
    Path(drone_id): Path<Uuid>,
) -> Result<(StatusCode, Json<DronePatrol>)> {
    let actor = current_actor(&state, &session).await?;
    let patrol = state.patrols.start_patrol(actor, drone_id).await?;
    Ok((StatusCode::ACCEPTED, Json(patrol)))
}

async fn stop_patrol(
    State(state): State<AppState>,
    session: Session,
    Path(drone_id): Path<Uuid>,
) -> Result<Json<Drone>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(state.patrols.stop_patrol(actor, drone_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/drones", get(list_drones).post(add_drone))
        .route("/api/drones/:id", delete(delete_drone))
        .route("/api/drones/:id/patrols", get(list_patrols))
        .route("/api/drones/:id/patrol/start", post(start_patrol))
        .route("/api/drones/:id/patrol/stop", post(stop_patrol))
}
