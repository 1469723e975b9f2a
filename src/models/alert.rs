use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::resource::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Assigned,
    InProgress,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Assigned => "assigned",
            AlertStatus::InProgress => "in_progress",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub alert_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: AlertStatus,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAlertData {
    pub title: String,
    pub description: Option<String>,
    pub alert_type: String,
    pub location: Coordinate,
    pub created_by: Option<Uuid>,
}

/// Which alerts a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertVisibility {
    All,
    /// Alerts assigned to this user or to nobody.
    AssignedToOrUnassigned(Uuid),
}

impl AlertVisibility {
    pub fn admits(&self, alert: &Alert) -> bool {
        match self {
            AlertVisibility::All => true,
            AlertVisibility::AssignedToOrUnassigned(user_id) => {
                alert.assigned_to.is_none() || alert.assigned_to == Some(*user_id)
            }
        }
    }
}

/// Actions that move an alert through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    /// A worker claims an open, unassigned alert.
    Take,
    /// The assignee starts working on it.
    StartIntervention,
    /// The assignee closes it.
    Resolve,
    /// An admin hands the alert to a worker, replacing any assignee.
    AdminAssign { worker_id: Uuid },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertTransitionError {
    #[error("Alert is {actual}, expected {expected}")]
    WrongStatus {
        expected: AlertStatus,
        actual: AlertStatus,
    },

    #[error("Alert is already assigned")]
    AlreadyAssigned,

    #[error("Alert is not assigned to you")]
    NotAssignee,

    #[error("Alert is already resolved")]
    AlreadyResolved,
}

/// A guarded write: applied only if the stored alert still has the
/// expected status and assignee.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertUpdate {
    pub expected_status: AlertStatus,
    pub expected_assignee: Option<Uuid>,
    pub status: AlertStatus,
    pub assigned_to: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertUpdate {
    pub fn matches(&self, alert: &Alert) -> bool {
        alert.status == self.expected_status && alert.assigned_to == self.expected_assignee
    }
}

impl Alert {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Computes the write that `action` by `actor_id` implies, or why it is
    /// not allowed from the current state.
    pub fn plan_transition(
        &self,
        action: AlertAction,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AlertUpdate, AlertTransitionError> {
        let guarded = |status: AlertStatus, assigned_to: Option<Uuid>, resolved_at| AlertUpdate {
            expected_status: self.status,
            expected_assignee: self.assigned_to,
            status,
            assigned_to,
            resolved_at,
        };

        match action {
            AlertAction::Take => {
                if self.status != AlertStatus::Open {
                    return Err(AlertTransitionError::WrongStatus {
                        expected: AlertStatus::Open,
                        actual: self.status,
                    });
                }
                if self.assigned_to.is_some() {
                    return Err(AlertTransitionError::AlreadyAssigned);
                }
                Ok(guarded(AlertStatus::Assigned, Some(actor_id), None))
            }
            AlertAction::StartIntervention => {
                if self.assigned_to != Some(actor_id) {
                    return Err(AlertTransitionError::NotAssignee);
                }
                if self.status != AlertStatus::Assigned {
                    return Err(AlertTransitionError::WrongStatus {
                        expected: AlertStatus::Assigned,
                        actual: self.status,
                    });
                }
                Ok(guarded(AlertStatus::InProgress, Some(actor_id), None))
            }
            AlertAction::Resolve => {
                if self.assigned_to != Some(actor_id) {
                    return Err(AlertTransitionError::NotAssignee);
                }
                if self.status != AlertStatus::InProgress {
                    return Err(AlertTransitionError::WrongStatus {
                        expected: AlertStatus::InProgress,
                        actual: self.status,
                    });
                }
                Ok(guarded(AlertStatus::Resolved, Some(actor_id), Some(now)))
            }
            AlertAction::AdminAssign { worker_id } => {
                if self.status == AlertStatus::Resolved {
                    return Err(AlertTransitionError::AlreadyResolved);
                }
                Ok(guarded(AlertStatus::Assigned, Some(worker_id), None))
            }
        }
    }
}
