// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::scheduling::AppointmentStatus;

use crate::models::AppointmentError;

/// Outcome of a legal transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply(AppointmentStatus),
    NoOp,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a status transition. Requesting the current status is a
    /// no-op; everything outside the transition table is rejected.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Transition, AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == new_status {
            return Ok(Transition::NoOp);
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(Transition::Apply(new_status))
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
            ],
            // Terminal states
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::Completed => vec![],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }

    /// Only appointments that have not concluded may be moved in time.
    pub fn can_reschedule(&self, status: AppointmentStatus) -> bool {
        matches!(status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use AppointmentStatus::*;

    #[test]
    fn test_forward_transitions() {
        let lifecycle = AppointmentLifecycleService::new();

        assert_eq!(lifecycle.validate_status_transition(Pending, Confirmed).unwrap(), Transition::Apply(Confirmed));
        assert_eq!(lifecycle.validate_status_transition(Pending, Cancelled).unwrap(), Transition::Apply(Cancelled));
        assert_eq!(lifecycle.validate_status_transition(Confirmed, Completed).unwrap(), Transition::Apply(Completed));
        assert_eq!(lifecycle.validate_status_transition(Confirmed, Cancelled).unwrap(), Transition::Apply(Cancelled));
    }

    #[test]
    fn test_same_state_is_noop() {
        let lifecycle = AppointmentLifecycleService::new();

        for status in AppointmentStatus::ALL {
            assert_eq!(lifecycle.validate_status_transition(status, status).unwrap(), Transition::NoOp);
        }
    }

    #[test]
    fn test_cancelled_is_never_resurrected() {
        let lifecycle = AppointmentLifecycleService::new();

        assert_matches!(
            lifecycle.validate_status_transition(Cancelled, Confirmed),
            Err(AppointmentError::InvalidStatusTransition { from: Cancelled, to: Confirmed })
        );
        assert!(lifecycle.validate_status_transition(Cancelled, Pending).is_err());
        assert!(lifecycle.validate_status_transition(Completed, Cancelled).is_err());
        assert!(lifecycle.validate_status_transition(Confirmed, Pending).is_err());
    }

    #[test]
    fn test_terminal_states() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.is_terminal(Cancelled));
        assert!(lifecycle.is_terminal(Completed));
        assert!(!lifecycle.is_terminal(Pending));
        assert!(lifecycle.can_reschedule(Confirmed));
        assert!(!lifecycle.can_reschedule(Completed));
    }
}
