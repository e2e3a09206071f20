use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::AppointmentRepository;

use crate::models::{AppointmentError, ConflictParty};

/// A calendar whose occupancy is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Professional(Uuid),
    Customer(Uuid),
}

impl Party {
    pub fn kind(&self) -> ConflictParty {
        match self {
            Party::Professional(_) => ConflictParty::Professional,
            Party::Customer(_) => ConflictParty::Customer,
        }
    }
}

/// Read-only overlap checks against stored appointments. Cancelled
/// appointments never conflict.
#[derive(Clone)]
pub struct ConflictDetectionService {
    appointments: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>) -> Self {
        Self { appointments }
    }

    /// Whether `party` already holds an appointment overlapping the closed
    /// window `[window_start, window_end]`.
    pub async fn has_conflict(
        &self,
        party: Party,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!("Checking {:?} from {} to {}", party, window_start, window_end);

        let busy = match party {
            Party::Professional(id) => {
                self.appointments
                    .exists_appointment_for_professional_in_window(id, window_start, window_end, exclude_appointment_id)
                    .await?
            }
            Party::Customer(id) => {
                self.appointments
                    .exists_appointment_for_customer_in_window(id, window_start, window_end, exclude_appointment_id)
                    .await?
            }
        };

        if busy {
            warn!("Conflict detected for {:?} between {} and {}", party, window_start, window_end);
        }

        Ok(busy)
    }

    /// Professional first, then customer; the first busy calendar names the
    /// conflict.
    pub async fn check_booking(
        &self,
        professional_id: Uuid,
        customer_id: Uuid,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        for party in [Party::Professional(professional_id), Party::Customer(customer_id)] {
            if self.has_conflict(party, window_start, window_end, exclude_appointment_id).await? {
                return Err(AppointmentError::SchedulingConflict(party.kind()));
            }
        }

        Ok(())
    }
}
