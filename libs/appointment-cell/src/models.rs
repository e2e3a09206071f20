// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authorization_cell::AuthorizationError;
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentQuery, AppointmentStatus, StatusCount};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub professional_id: Uuid,
    pub start_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: NaiveDateTime,
}

/// Generic update: an optional move followed by an optional status change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<NaiveDateTime>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: AppointmentStatus,
}

/// Appointment enriched with the names a client needs to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub service_name: Option<String>,
    pub service_duration_minutes: i64,
    pub service_price: Option<f64>,
    pub professional_name: Option<String>,
    pub professional_specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub counts: Vec<StatusCount>,
    pub total: u64,
}

impl StatusSummary {
    pub fn from_counts(counts: Vec<StatusCount>) -> Self {
        let total = counts.iter().map(|c| c.count).sum();
        Self { counts, total }
    }

    pub fn count_of(&self, status: AppointmentStatus) -> u64 {
        self.counts
            .iter()
            .find(|c| c.status == status)
            .map_or(0, |c| c.count)
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQueryParams {
    pub customer_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl From<AppointmentQueryParams> for AppointmentQuery {
    fn from(params: AppointmentQueryParams) -> Self {
        AppointmentQuery {
            customer_id: params.customer_id,
            professional_id: params.professional_id,
            status: params.status,
            from: params.from,
            to: params.to,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangeQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpcomingAppointmentsQuery {
    pub hours_ahead: Option<i64>,
}

// ==============================================================================
// ERROR MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Customer,
    Service,
    Professional,
    Appointment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Customer => write!(f, "Customer"),
            ResourceKind::Service => write!(f, "Service"),
            ResourceKind::Professional => write!(f, "Professional"),
            ResourceKind::Appointment => write!(f, "Appointment"),
        }
    }
}

/// Which calendar rejected a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictParty {
    Professional,
    Customer,
}

impl fmt::Display for ConflictParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictParty::Professional => write!(f, "The professional is not available at that time"),
            ConflictParty::Customer => write!(f, "The customer already has an appointment at that time"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: ResourceKind, id: Uuid },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    SchedulingConflict(ConflictParty),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppointmentError {
    pub fn not_found(resource: ResourceKind, id: Uuid) -> Self {
        AppointmentError::NotFound { resource, id }
    }
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::Internal(format!("{:#}", err))
    }
}

impl From<AuthorizationError> for AppointmentError {
    fn from(err: AuthorizationError) -> Self {
        AppointmentError::Internal(err.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound { .. } => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(err.to_string()),
            AppointmentError::SchedulingConflict(party) => AppError::SchedulingConflict(party.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::DuplicateResource(msg) => AppError::Duplicate(msg),
            AppointmentError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_categories_map_to_http_status() {
        let cases = [
            (AppointmentError::not_found(ResourceKind::Service, Uuid::nil()), StatusCode::NOT_FOUND),
            (AppointmentError::InvalidRequest("past".into()), StatusCode::BAD_REQUEST),
            (
                AppointmentError::InvalidStatusTransition {
                    from: AppointmentStatus::Cancelled,
                    to: AppointmentStatus::Confirmed,
                },
                StatusCode::BAD_REQUEST,
            ),
            (AppointmentError::SchedulingConflict(ConflictParty::Customer), StatusCode::CONFLICT),
            (AppointmentError::Unauthorized, StatusCode::FORBIDDEN),
            (AppointmentError::DuplicateResource("name".into()), StatusCode::CONFLICT),
            (AppointmentError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_conflict_and_duplicate_are_distinguishable() {
        let conflict = AppError::from(AppointmentError::SchedulingConflict(ConflictParty::Professional));
        let duplicate = AppError::from(AppointmentError::DuplicateResource("Masaje".into()));

        assert_eq!(conflict.code(), "scheduling_conflict");
        assert_eq!(duplicate.code(), "duplicate_resource");
    }

    #[test]
    fn test_not_found_names_resource() {
        let id = Uuid::new_v4();
        let message = AppointmentError::not_found(ResourceKind::Professional, id).to_string();
        assert!(message.starts_with("Professional not found"));
        assert!(message.contains(&id.to_string()));
    }

    #[test]
    fn test_status_summary_total() {
        let summary = StatusSummary::from_counts(vec![
            StatusCount { status: AppointmentStatus::Pending, count: 2 },
            StatusCount { status: AppointmentStatus::Cancelled, count: 1 },
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count_of(AppointmentStatus::Pending), 2);
        assert_eq!(summary.count_of(AppointmentStatus::Completed), 0);
    }
}
