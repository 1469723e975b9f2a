use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{AlertStore, IdentityStore, Store, StoreError};
use crate::models::{
    alert::{Alert, AlertAction, AlertStatus, AlertTransitionError, AlertVisibility, CreateAlertData},
    resource::Coordinate,
    role::{effective_role, Actor, AppRole},
};

#[derive(thiserror::Error, Debug)]
pub enum AlertError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] AlertTransitionError),

    #[error("Alert not found")]
    NotFound,

    #[error("Only workers and admins can handle alerts")]
    StaffOnly,

    #[error("Only admins can assign alerts")]
    AdminOnly,

    #[error("Assignee must be a worker")]
    NotAWorker,

    #[error("Alert was changed by someone else, reload and try again")]
    Conflict,

    #[error("{0}")]
    Validation(String),
}

/// Input for a manually reported alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub title: String,
    pub description: Option<String>,
    pub alert_type: String,
    pub location: Coordinate,
}

/// Alerts a worker sees, with how many are on their plate.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub assigned_open: usize,
    pub alerts: Vec<Alert>,
}

fn visibility_for(actor: Actor) -> Result<AlertVisibility, AlertError> {
    match actor.role {
        AppRole::Admin => Ok(AlertVisibility::All),
        AppRole::Worker => Ok(AlertVisibility::AssignedToOrUnassigned(actor.user_id)),
        AppRole::Client => Err(AlertError::StaffOnly),
    }
}

/// Newest first. Admins see everything; workers see alerts that are
/// unassigned or assigned to themselves.
pub async fn list_visible_alerts(store: &dyn Store, actor: Actor) -> Result<Vec<Alert>, AlertError> {
    let visibility = visibility_for(actor)?;
    Ok(store.list_alerts(visibility).await?)
}

pub async fn worker_summary(store: &dyn Store, actor: Actor) -> Result<WorkerSummary, AlertError> {
    let alerts = list_visible_alerts(store, actor).await?;
    let assigned_open = alerts
        .iter()
        .filter(|a| a.assigned_to == Some(actor.user_id) && a.status != AlertStatus::Resolved)
        .count();

    Ok(WorkerSummary {
        assigned_open,
        alerts,
    })
}

#[tracing::instrument(skip(store, new_alert), fields(actor = %actor.user_id))]
pub async fn create_alert(
    store: &dyn Store,
    actor: Actor,
    new_alert: NewAlert,
) -> Result<Alert, AlertError> {
    if !actor.is_staff() {
        return Err(AlertError::StaffOnly);
    }

    let title = new_alert.title.trim();
    if title.is_empty() {
        return Err(AlertError::Validation("Title is required".to_string()));
    }
    let alert_type = new_alert.alert_type.trim();
    if alert_type.is_empty() {
        return Err(AlertError::Validation("Alert type is required".to_string()));
    }
    if !new_alert.location.is_valid() {
        return Err(AlertError::Validation("Coordinates are out of range".to_string()));
    }

    let alert = store
        .insert_alert(CreateAlertData {
            title: title.to_string(),
            description: new_alert
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            alert_type: alert_type.to_string(),
            location: new_alert.location,
            created_by: Some(actor.user_id),
        })
        .await?;

    tracing::info!(alert_id = %alert.id, "Alert created");

    Ok(alert)
}

async fn transition(
    store: &dyn Store,
    actor: Actor,
    alert_id: Uuid,
    action: AlertAction,
) -> Result<Alert, AlertError> {
    let alert = store
        .find_alert(alert_id)
        .await?
        .ok_or(AlertError::NotFound)?;

    commit_transition(store, actor, &alert, action).await
}

/// Plans `action` against the `alert` snapshot and writes it only if the
/// stored row still matches that snapshot.
async fn commit_transition(
    store: &dyn Store,
    actor: Actor,
    alert: &Alert,
    action: AlertAction,
) -> Result<Alert, AlertError> {
    let update = alert.plan_transition(action, actor.user_id, Utc::now())?;

    let updated = store
        .apply_alert_update(alert.id, &update)
        .await?
        .ok_or(AlertError::Conflict)?;

    tracing::info!(
        alert_id = %alert.id,
        actor = %actor.user_id,
        from = %alert.status,
        to = %updated.status,
        "Alert transitioned"
    );

    Ok(updated)
}

/// Claims an open, unassigned alert for the acting worker.
#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn take_alert(store: &dyn Store, actor: Actor, alert_id: Uuid) -> Result<Alert, AlertError> {
    if !actor.is_staff() {
        return Err(AlertError::StaffOnly);
    }
    transition(store, actor, alert_id, AlertAction::Take).await
}

#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn start_intervention(
    store: &dyn Store,
    actor: Actor,
    alert_id: Uuid,
) -> Result<Alert, AlertError> {
    if !actor.is_staff() {
        return Err(AlertError::StaffOnly);
    }
    transition(store, actor, alert_id, AlertAction::StartIntervention).await
}

#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn resolve_alert(
    store: &dyn Store,
    actor: Actor,
    alert_id: Uuid,
) -> Result<Alert, AlertError> {
    if !actor.is_staff() {
        return Err(AlertError::StaffOnly);
    }
    transition(store, actor, alert_id, AlertAction::Resolve).await
}

/// Hands the alert to `worker_id`, replacing any current assignee.
#[tracing::instrument(skip(store), fields(actor = %actor.user_id))]
pub async fn admin_assign(
    store: &dyn Store,
    actor: Actor,
    alert_id: Uuid,
    worker_id: Uuid,
) -> Result<Alert, AlertError> {
    if !actor.is_admin() {
        return Err(AlertError::AdminOnly);
    }

    let roles = store.list_roles_for_user(worker_id).await?;
    if roles.is_empty() || effective_role(&roles) != AppRole::Worker {
        return Err(AlertError::NotAWorker);
    }

    transition(store, actor, alert_id, AlertAction::AdminAssign { worker_id }).await
}
