use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::error::Result;
use crate::models::{alert::Alert, resource::Coordinate};
use crate::services::alerts::{self, NewAlert, WorkerSummary};

#[derive(Deserialize)]
struct NewAlertBody {
    title: String,
    description: Option<String>,
    #[serde(rename = "type")]
    alert_type: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct AssignBody {
    worker_id: Uuid,
}

async fn list_alerts(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Alert>>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(alerts::list_visible_alerts(state.store.as_ref(), actor).await?))
}

async fn summary(State(state): State<AppState>, session: Session) -> Result<Json<WorkerSummary>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(alerts::worker_summary(state.store.as_ref(), actor).await?))
}

async fn create_alert(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NewAlertBody>,
) -> Result<(StatusCode, Json<Alert>)> {
    let actor = current_actor(&state, &session).await?;
    let alert = alerts::create_alert(
        state.store.as_ref(),
        actor,
        NewAlert {
            title: body.title,
            description: body.description,
            alert_type: body.alert_type,
            location: Coordinate::new(body.latitude, body.longitude),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn take(
    State(state): State<AppState>,
    session: Session,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<Alert>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(alerts::take_alert(state.store.as_ref(), actor, alert_id).await?))
}

async fn start(
    State(state): State<AppState>,
    session: Session,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<Alert>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        alerts::start_intervention(state.store.as_ref(), actor, alert_id).await?,
    ))
}

async fn resolve(
    State(state): State<AppState>,
    session: Session,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<Alert>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(alerts::resolve_alert(state.store.as_ref(), actor, alert_id).await?))
}

async fn assign(
    State(state): State<AppState>,
    session: Session,
    Path(alert_id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Alert>> {
    let actor = current_actor(&state, &session).await?;
    Ok(Json(
        alerts::admin_assign(state.store.as_ref(), actor, alert_id, body.worker_id).await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/summary", get(summary))
        .route("/api/alerts/:id/take", post(take))
        .route("/api/alerts/:id/start", post(start))
        .route("/api/alerts/:id/resolve", post(resolve))
        .route("/api/alerts/:id/assign", post(assign))
}
