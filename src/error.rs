use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::models::alert::AlertTransitionError;
use crate::services::{
    admin::AdminError,
    alerts::AlertError,
    auth::AuthError,
    drone_patrol::PatrolError,
    image_analysis::AnalysisError,
    promo::PromoError,
    qr_generator::QrGenerationError,
    reservations::ReservationError,
    subscriptions::SubscriptionError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Session(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store and session details stay in the logs
        let message = match &self {
            AppError::Store(_) => "Database error".to_string(),
            AppError::Session(_) => "Session error".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let body = Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(e) => AppError::Store(e),
            AuthError::Password(e) => AppError::Internal(e.to_string()),
            AuthError::InvalidEmail | AuthError::PasswordTooShort => {
                AppError::Validation(e.to_string())
            }
            AuthError::EmailTaken => AppError::Conflict(e.to_string()),
            AuthError::InvalidCredentials => AppError::Unauthorized,
        }
    }
}

impl From<AlertError> for AppError {
    fn from(e: AlertError) -> Self {
        match e {
            AlertError::Store(e) => AppError::Store(e),
            AlertError::Transition(AlertTransitionError::NotAssignee)
            | AlertError::StaffOnly
            | AlertError::AdminOnly => AppError::Forbidden(e.to_string()),
            AlertError::Transition(_) => AppError::Conflict(e.to_string()),
            AlertError::NotFound => AppError::NotFound(e.to_string()),
            AlertError::NotAWorker | AlertError::Validation(_) => {
                AppError::Validation(e.to_string())
            }
            AlertError::Conflict => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::Store(e) => AppError::Store(e),
            ReservationError::ResourceNotFound | ReservationError::NotFound => {
                AppError::NotFound(e.to_string())
            }
            ReservationError::AdminOnly => AppError::Forbidden(e.to_string()),
            ReservationError::ResourceUnavailable
            | ReservationError::SlotTaken
            | ReservationError::InvalidTransition { .. }
            | ReservationError::Conflict => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::Store(e) => AppError::Store(e),
            AdminError::AdminOnly => AppError::Forbidden(e.to_string()),
            AdminError::UserNotFound => AppError::NotFound(e.to_string()),
        }
    }
}

/// Direct calls to the analysis function: gateway failures other than
/// throttling and quota are plain 500s.
impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::MissingImageUrl => AppError::Validation(e.to_string()),
            AnalysisError::RateLimited => AppError::RateLimited(e.to_string()),
            AnalysisError::QuotaExhausted => AppError::PaymentRequired(e.to_string()),
            AnalysisError::NotConfigured
            | AnalysisError::Gateway(_)
            | AnalysisError::EmptyResponse
            | AnalysisError::Http(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<PatrolError> for AppError {
    fn from(e: PatrolError) -> Self {
        match e {
            PatrolError::Store(e) => AppError::Store(e),
            PatrolError::Analysis(e) => match AppError::from(e) {
                AppError::Internal(msg) => AppError::Upstream(msg),
                other => other,
            },
            PatrolError::AdminOnly => AppError::Forbidden(e.to_string()),
            PatrolError::DroneNotFound => AppError::NotFound(e.to_string()),
            PatrolError::NotIdle(_) => AppError::Conflict(e.to_string()),
            PatrolError::NoSampleImages => AppError::Internal(e.to_string()),
            PatrolError::Validation(_) => AppError::Validation(e.to_string()),
        }
    }
}

impl From<PromoError> for AppError {
    fn from(e: PromoError) -> Self {
        match e {
            PromoError::Store(e) => AppError::Store(e),
            PromoError::Rejected(_) | PromoError::Validation(_) => {
                AppError::Validation(e.to_string())
            }
            PromoError::AdminOnly => AppError::Forbidden(e.to_string()),
            PromoError::NotFound => AppError::NotFound(e.to_string()),
            PromoError::DuplicateCode => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<QrGenerationError> for AppError {
    fn from(e: QrGenerationError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<SubscriptionError> for AppError {
    fn from(e: SubscriptionError) -> Self {
        match e {
            SubscriptionError::Store(e) => AppError::Store(e),
            SubscriptionError::Promo(e) => e.into(),
            SubscriptionError::Qr(e) => e.into(),
            SubscriptionError::Validation(_) => AppError::Validation(e.to_string()),
            SubscriptionError::PlanNotFound | SubscriptionError::CardNotFound => {
                AppError::NotFound(e.to_string())
            }
            SubscriptionError::PlanInactive | SubscriptionError::PromoNoLongerValid => {
                AppError::Conflict(e.to_string())
            }
            SubscriptionError::AdminOnly => AppError::Forbidden(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{alert::AlertStatus, promo_code::PromoRejection};

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            AppError::from(AuthError::PasswordTooShort).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AlertError::StaffOnly).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(ReservationError::SlotTaken).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(PromoError::Rejected(PromoRejection::Expired)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(PatrolError::NotIdle(crate::models::drone::DroneStatus::Patrolling)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(AlertError::Transition(AlertTransitionError::NotAssignee)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AlertError::Transition(AlertTransitionError::WrongStatus {
                expected: AlertStatus::Assigned,
                actual: AlertStatus::Open,
            }))
            .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_analysis_errors_keep_gateway_codes() {
        assert_eq!(
            AppError::from(AnalysisError::RateLimited).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::from(AnalysisError::QuotaExhausted).status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::from(AnalysisError::EmptyResponse).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(PatrolError::Analysis(AnalysisError::EmptyResponse)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(PatrolError::Analysis(AnalysisError::RateLimited)).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
