// libs/appointment-cell/src/services/booking.rs
use chrono::{Duration, Local, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use authorization_cell::AuthorizationPolicy;
use shared_config::AppConfig;
use shared_database::Repositories;
use shared_models::auth::Principal;
use shared_models::scheduling::{Appointment, AppointmentQuery, AppointmentStatus};

use crate::models::{
    AppointmentDetails, AppointmentError, BookAppointmentRequest, ResourceKind, StatusSummary,
    UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::duration::DurationParser;
use crate::services::lifecycle::{AppointmentLifecycleService, Transition};
use crate::services::locks::{LockKey, SchedulingGuard, SchedulingLocks};

const DEFAULT_UPCOMING_HOURS: i64 = 24;

/// Who may drive a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionGuard {
    /// ADMIN or PROFESSIONAL.
    Staff,
    /// ADMIN or the appointment's customer.
    OwnerOrAdmin,
}

impl TransitionGuard {
    fn for_target(target: AppointmentStatus) -> Self {
        match target {
            AppointmentStatus::Confirmed | AppointmentStatus::Completed => TransitionGuard::Staff,
            AppointmentStatus::Cancelled | AppointmentStatus::Pending => TransitionGuard::OwnerOrAdmin,
        }
    }
}

/// The scheduling engine. Every operation takes the acting principal.
#[derive(Clone)]
pub struct AppointmentBookingService {
    repositories: Repositories,
    policy: AuthorizationPolicy,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    duration_parser: DurationParser,
    locks: SchedulingLocks,
}

impl AppointmentBookingService {
    pub fn new(repositories: Repositories, config: &AppConfig) -> Self {
        Self {
            policy: AuthorizationPolicy::new(repositories.clone()),
            conflict_service: ConflictDetectionService::new(repositories.appointments.clone()),
            lifecycle_service: AppointmentLifecycleService::new(),
            duration_parser: DurationParser::new(config.default_service_duration_minutes),
            locks: SchedulingLocks::new(),
            repositories,
        }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Create a PENDING appointment once every referenced resource exists,
    /// the start lies in the future and neither calendar is busy.
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn book_appointment(
        &self,
        principal: &Principal,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.authorize_booking(principal, request.customer_id).await?;

        let customer = self
            .repositories
            .accounts
            .find_account_by_id(request.customer_id)
            .await?
            .ok_or_else(|| AppointmentError::not_found(ResourceKind::Customer, request.customer_id))?;

        let service = self
            .repositories
            .services
            .find_service_by_id(request.service_id)
            .await?
            .ok_or_else(|| AppointmentError::not_found(ResourceKind::Service, request.service_id))?;

        let professional = self
            .repositories
            .professionals
            .find_professional_by_id(request.professional_id)
            .await?
            .ok_or_else(|| AppointmentError::not_found(ResourceKind::Professional, request.professional_id))?;

        self.ensure_future(request.start_time)?;

        let duration_minutes = self.duration_parser.parse(service.duration.as_deref());
        let window_end = self.window_end(request.start_time, duration_minutes)?;

        let _guard = self
            .locks
            .acquire([LockKey::Professional(professional.id), LockKey::Customer(customer.id)])
            .await;

        self.conflict_service
            .check_booking(professional.id, customer.id, request.start_time, window_end, None)
            .await?;

        let appointment = Appointment::pending(
            customer.id,
            service.id,
            professional.id,
            request.start_time,
            window_end,
        );
        let saved = self.repositories.appointments.save_appointment(&appointment).await?;

        info!(
            "Booked appointment {} for customer {} with professional {} at {}",
            saved.id, saved.customer_id, saved.professional_id, saved.start_time
        );
        Ok(saved)
    }

    async fn authorize_booking(&self, principal: &Principal, customer_id: Uuid) -> Result<(), AppointmentError> {
        if principal.is_admin() || principal.is_professional() {
            return Ok(());
        }

        if self.policy.current_account_id(principal).await? == Some(customer_id) {
            return Ok(());
        }

        warn!("{} may not book on behalf of customer {}", principal.subject, customer_id);
        Err(AppointmentError::Unauthorized)
    }

    fn ensure_future(&self, start_time: NaiveDateTime) -> Result<(), AppointmentError> {
        if start_time <= self.now() {
            warn!("Rejected start time {} not in the future", start_time);
            return Err(AppointmentError::InvalidRequest(
                "Appointment start time must be in the future".to_string(),
            ));
        }
        Ok(())
    }

    fn window_end(&self, start_time: NaiveDateTime, duration_minutes: i64) -> Result<NaiveDateTime, AppointmentError> {
        Appointment::window_end(start_time, duration_minutes).ok_or_else(|| {
            warn!("Window of {} minutes from {} is out of range", duration_minutes, start_time);
            AppointmentError::InvalidRequest("Appointment end time is out of range".to_string())
        })
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn get_appointment(&self, principal: &Principal, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;

        if !self.policy.can_view_appointment_record(principal, &appointment).await? {
            return Err(AppointmentError::Unauthorized);
        }

        Ok(appointment)
    }

    pub async fn get_appointment_details(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.get_appointment(principal, appointment_id).await?;

        let (customer, service, professional) = futures::try_join!(
            self.repositories.accounts.find_account_by_id(appointment.customer_id),
            self.repositories.services.find_service_by_id(appointment.service_id),
            self.repositories.professionals.find_professional_by_id(appointment.professional_id),
        )?;

        let professional_account = match &professional {
            Some(p) => self.repositories.accounts.find_account_by_id(p.account_id).await?,
            None => None,
        };

        Ok(AppointmentDetails {
            customer_name: customer.as_ref().map(|c| c.name.clone()),
            customer_email: customer.map(|c| c.email),
            service_name: service.as_ref().map(|s| s.name.clone()),
            service_duration_minutes: appointment.duration_minutes(),
            service_price: service.and_then(|s| s.price),
            professional_name: professional_account.map(|a| a.name),
            professional_specialty: professional.and_then(|p| p.specialty),
            appointment,
        })
    }

    /// ADMIN sees every match; everyone else only sees appointments they
    /// are the customer or the professional of.
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn list_appointments(
        &self,
        principal: &Principal,
        query: AppointmentQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppointmentError::InvalidRequest(
                    "Range start must not be after range end".to_string(),
                ));
            }
        }

        let appointments = self.repositories.appointments.find_appointments(&query).await?;
        if principal.is_admin() {
            return Ok(appointments);
        }

        let account_id = self.policy.current_account_id(principal).await?;
        let professional_id = self.policy.current_professional_id(principal).await?;
        if account_id.is_none() && professional_id.is_none() {
            return Err(AppointmentError::Unauthorized);
        }

        let visible: Vec<Appointment> = appointments
            .into_iter()
            .filter(|a| Some(a.customer_id) == account_id || Some(a.professional_id) == professional_id)
            .collect();

        debug!("{} appointments visible to {}", visible.len(), principal.subject);
        Ok(visible)
    }

    pub async fn list_by_customer(&self, principal: &Principal, customer_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_appointments(principal, AppointmentQuery::for_customer(customer_id)).await
    }

    pub async fn list_by_professional(
        &self,
        principal: &Principal,
        professional_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_appointments(principal, AppointmentQuery::for_professional(professional_id)).await
    }

    pub async fn list_by_status(
        &self,
        principal: &Principal,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_appointments(principal, AppointmentQuery::with_status(status)).await
    }

    pub async fn list_in_range(
        &self,
        principal: &Principal,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_appointments(principal, AppointmentQuery::between(start, end)).await
    }

    /// Appointments starting within the next `hours_ahead` hours (24 if unset).
    pub async fn list_upcoming(
        &self,
        principal: &Principal,
        hours_ahead: Option<i64>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let hours = hours_ahead.unwrap_or(DEFAULT_UPCOMING_HOURS);
        if hours <= 0 {
            return Err(AppointmentError::InvalidRequest("hours_ahead must be positive".to_string()));
        }

        let now = self.now();
        let horizon = Duration::try_hours(hours)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| AppointmentError::InvalidRequest("hours_ahead is too large".to_string()))?;

        self.list_in_range(principal, now, horizon).await
    }

    pub async fn count_by_status(&self, principal: &Principal) -> Result<StatusSummary, AppointmentError> {
        if !principal.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }

        let counts = self.repositories.appointments.count_by_status().await?;
        Ok(StatusSummary::from_counts(counts))
    }

    // ==========================================================================
    // STATUS TRANSITIONS
    // ==========================================================================

    pub async fn confirm(&self, principal: &Principal, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(principal, appointment_id, AppointmentStatus::Confirmed).await
    }

    pub async fn cancel(&self, principal: &Principal, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(principal, appointment_id, AppointmentStatus::Cancelled).await
    }

    pub async fn complete(&self, principal: &Principal, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(principal, appointment_id, AppointmentStatus::Completed).await
    }

    /// Direct status writes go through the same guards as the named
    /// transitions.
    pub async fn change_status(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(principal, appointment_id, status).await
    }

    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    async fn transition(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let _guard = self.locks.acquire([LockKey::Appointment(appointment_id)]).await;

        let mut appointment = self.load(appointment_id).await?;
        self.authorize_transition(principal, &appointment, target).await?;

        let previous = appointment.status;
        if !self.apply_transition(&mut appointment, target)? {
            debug!("Appointment {} already {}", appointment_id, target);
            return Ok(appointment);
        }

        let saved = self.repositories.appointments.save_appointment(&appointment).await?;
        info!("Appointment {} moved from {} to {}", appointment_id, previous, target);
        Ok(saved)
    }

    async fn authorize_transition(
        &self,
        principal: &Principal,
        appointment: &Appointment,
        target: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        let allowed = match TransitionGuard::for_target(target) {
            TransitionGuard::Staff => principal.is_admin() || principal.is_professional(),
            TransitionGuard::OwnerOrAdmin => self.policy.can_modify_appointment_record(principal, appointment).await?,
        };
        if !allowed {
            warn!("{} may not move appointment {} to {}", principal.subject, appointment.id, target);
            return Err(AppointmentError::Unauthorized);
        }
        Ok(())
    }

    /// Sets the new status in memory. `false` means the appointment was
    /// already there.
    fn apply_transition(&self, appointment: &mut Appointment, target: AppointmentStatus) -> Result<bool, AppointmentError> {
        match self.lifecycle_service.validate_status_transition(appointment.status, target)? {
            Transition::NoOp => Ok(false),
            Transition::Apply(status) => {
                appointment.status = status;
                Ok(true)
            }
        }
    }

    // ==========================================================================
    // RESCHEDULE / UPDATE / REMOVE
    // ==========================================================================

    /// Move an appointment to a new start, keeping its duration.
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn reschedule_appointment(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        new_start_time: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        let _guard = self.lock_for_edit(principal, appointment_id).await?;

        // Re-read under the lock; the status may have moved meanwhile.
        let mut appointment = self.load(appointment_id).await?;
        let previous_start = appointment.start_time;
        self.apply_move(&mut appointment, new_start_time).await?;
        let saved = self.repositories.appointments.save_appointment(&appointment).await?;

        info!("Appointment {} rescheduled from {} to {}", appointment_id, previous_start, new_start_time);
        Ok(saved)
    }

    /// Optional move plus optional status change, validated together and
    /// written once.
    #[instrument(skip(self, principal, update), fields(subject = %principal.subject))]
    pub async fn update_appointment(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        update: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if update.start_time.is_none() && update.status.is_none() {
            return Err(AppointmentError::InvalidRequest("Nothing to update".to_string()));
        }

        let _guard = self.lock_for_edit(principal, appointment_id).await?;

        let original = self.load(appointment_id).await?;
        let mut appointment = original.clone();

        if let Some(status) = update.status {
            self.authorize_transition(principal, &appointment, status).await?;
            self.lifecycle_service.validate_status_transition(appointment.status, status)?;
        }
        if let Some(start_time) = update.start_time {
            self.apply_move(&mut appointment, start_time).await?;
        }
        if let Some(status) = update.status {
            self.apply_transition(&mut appointment, status)?;
        }

        if appointment == original {
            debug!("Update of appointment {} changed nothing", appointment_id);
            return Ok(appointment);
        }

        let saved = self.repositories.appointments.save_appointment(&appointment).await?;
        info!(
            "Appointment {} updated: {} {} -> {} {}",
            appointment_id, original.start_time, original.status, saved.start_time, saved.status
        );
        Ok(saved)
    }

    /// Ownership check, then the appointment and both calendar locks.
    async fn lock_for_edit(&self, principal: &Principal, appointment_id: Uuid) -> Result<SchedulingGuard, AppointmentError> {
        let current = self.load(appointment_id).await?;
        if !self.policy.can_modify_appointment_record(principal, &current).await? {
            return Err(AppointmentError::Unauthorized);
        }

        Ok(self
            .locks
            .acquire([
                LockKey::Appointment(appointment_id),
                LockKey::Professional(current.professional_id),
                LockKey::Customer(current.customer_id),
            ])
            .await)
    }

    /// Validates a move of the locked appointment and applies it in memory.
    async fn apply_move(&self, appointment: &mut Appointment, new_start_time: NaiveDateTime) -> Result<(), AppointmentError> {
        if !self.lifecycle_service.can_reschedule(appointment.status) {
            return Err(AppointmentError::InvalidRequest(format!(
                "A {} appointment cannot be rescheduled",
                appointment.status
            )));
        }

        self.ensure_future(new_start_time)?;

        let new_end_time = self.window_end(new_start_time, appointment.duration_minutes())?;
        self.conflict_service
            .check_booking(
                appointment.professional_id,
                appointment.customer_id,
                new_start_time,
                new_end_time,
                Some(appointment.id),
            )
            .await?;

        appointment.start_time = new_start_time;
        appointment.end_time = new_end_time;
        Ok(())
    }

    /// Administrative deletion; not a lifecycle transition.
    #[instrument(skip(self, principal), fields(subject = %principal.subject))]
    pub async fn remove_appointment(&self, principal: &Principal, appointment_id: Uuid) -> Result<(), AppointmentError> {
        if !principal.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }

        let _guard = self.locks.acquire([LockKey::Appointment(appointment_id)]).await;
        if !self.repositories.appointments.delete_appointment(appointment_id).await? {
            return Err(AppointmentError::not_found(ResourceKind::Appointment, appointment_id));
        }

        info!("Appointment {} removed", appointment_id);
        Ok(())
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repositories
            .appointments
            .find_appointment_by_id(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::not_found(ResourceKind::Appointment, appointment_id))
    }
}
