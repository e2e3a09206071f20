//! Outbound collaborator interfaces required by the scheduling core.
//!
//! Every method is a potentially blocking call against storage. Lookups
//! return `Ok(None)` for missing rows; `Err` is reserved for storage failures.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use shared_models::scheduling::{
    Account, Appointment, AppointmentQuery, Professional, Service, StatusCount,
};

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;
}

#[async_trait]
pub trait ProfessionalRepository: Send + Sync {
    async fn find_professional_by_id(&self, id: Uuid) -> Result<Option<Professional>>;

    async fn find_professional_by_account_id(&self, account_id: Uuid) -> Result<Option<Professional>>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn find_service_by_id(&self, id: Uuid) -> Result<Option<Service>>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// Insert or replace by id; returns the stored row.
    async fn save_appointment(&self, appointment: &Appointment) -> Result<Appointment>;

    /// Returns whether a row was removed.
    async fn delete_appointment(&self, id: Uuid) -> Result<bool>;

    /// Matching appointments ordered by start time.
    async fn find_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>>;

    /// Whether a non-cancelled appointment of the professional overlaps the
    /// closed window `[start, end]`.
    async fn exists_appointment_for_professional_in_window(
        &self,
        professional_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool>;

    /// Same as the professional check, for the customer's calendar.
    async fn exists_appointment_for_customer_in_window(
        &self,
        customer_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool>;

    /// One entry per status, zero counts included.
    async fn count_by_status(&self) -> Result<Vec<StatusCount>>;
}

/// The set of collaborators the scheduling core and the policy layer share.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub professionals: Arc<dyn ProfessionalRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AccountRepository
            + ProfessionalRepository
            + ServiceRepository
            + AppointmentRepository
            + 'static,
    {
        Self {
            accounts: store.clone(),
            professionals: store.clone(),
            services: store.clone(),
            appointments: store,
        }
    }
}
