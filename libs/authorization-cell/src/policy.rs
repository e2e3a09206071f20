use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::Repositories;
use shared_models::auth::Principal;
use shared_models::scheduling::{Account, Appointment};

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Authorization lookup failed: {0}")]
    Lookup(#[from] anyhow::Error),
}

pub type PolicyResult<T> = Result<T, AuthorizationError>;

#[derive(Clone)]
pub struct AuthorizationPolicy {
    repositories: Repositories,
}

impl AuthorizationPolicy {
    pub fn new(repositories: Repositories) -> Self {
        Self { repositories }
    }

    // ==========================================================================
    // PRINCIPAL RESOLUTION
    // ==========================================================================

    pub async fn current_account(&self, principal: &Principal) -> PolicyResult<Option<Account>> {
        let Some(email) = principal.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            debug!("Principal {} carries no email", principal.subject);
            return Ok(None);
        };

        let account = self.repositories.accounts.find_account_by_email(email).await?;
        if account.is_none() {
            warn!("No account backs principal {}", email);
        }

        Ok(account)
    }

    pub async fn current_account_id(&self, principal: &Principal) -> PolicyResult<Option<Uuid>> {
        Ok(self.current_account(principal).await?.map(|account| account.id))
    }

    /// The professional profile owned by the principal's account, looked up
    /// at most once per principal.
    pub async fn current_professional_id(&self, principal: &Principal) -> PolicyResult<Option<Uuid>> {
        if let Some(cached) = principal.cached_professional_id() {
            return Ok(cached);
        }

        let professional_id = match self.current_account_id(principal).await? {
            Some(account_id) => self
                .repositories
                .professionals
                .find_professional_by_account_id(account_id)
                .await?
                .map(|professional| professional.id),
            None => None,
        };

        Ok(principal.remember_professional_id(professional_id))
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    /// ADMIN, or the appointment's customer. Missing appointments are denied.
    pub async fn can_modify_appointment(&self, principal: &Principal, appointment_id: Uuid) -> PolicyResult<bool> {
        if principal.is_admin() {
            return Ok(true);
        }

        match self.repositories.appointments.find_appointment_by_id(appointment_id).await? {
            Some(appointment) => self.can_modify_appointment_record(principal, &appointment).await,
            None => Ok(false),
        }
    }

    /// Same decision as [`Self::can_modify_appointment`] for an already loaded row.
    pub async fn can_modify_appointment_record(&self, principal: &Principal, appointment: &Appointment) -> PolicyResult<bool> {
        if principal.is_admin() {
            return Ok(true);
        }

        self.owns_appointment(principal, appointment).await
    }

    /// Ownership only; no ADMIN short-circuit.
    pub async fn is_owner_of_appointment(&self, principal: &Principal, appointment_id: Uuid) -> PolicyResult<bool> {
        match self.repositories.appointments.find_appointment_by_id(appointment_id).await? {
            Some(appointment) => self.owns_appointment(principal, &appointment).await,
            None => Ok(false),
        }
    }

    pub async fn can_view_appointment(&self, principal: &Principal, appointment_id: Uuid) -> PolicyResult<bool> {
        match self.repositories.appointments.find_appointment_by_id(appointment_id).await? {
            Some(appointment) => self.can_view_appointment_record(principal, &appointment).await,
            None => Ok(principal.is_admin()),
        }
    }

    /// ADMIN, the customer, or the professional the appointment is booked with.
    pub async fn can_view_appointment_record(&self, principal: &Principal, appointment: &Appointment) -> PolicyResult<bool> {
        if principal.is_admin() || self.owns_appointment(principal, appointment).await? {
            return Ok(true);
        }

        Ok(self.current_professional_id(principal).await? == Some(appointment.professional_id))
    }

    async fn owns_appointment(&self, principal: &Principal, appointment: &Appointment) -> PolicyResult<bool> {
        Ok(self.current_account_id(principal).await? == Some(appointment.customer_id))
    }

    // ==========================================================================
    // SERVICES, USERS, PROFESSIONALS
    // ==========================================================================

    /// ADMIN, or the account owning the service's professional. Unowned
    /// services are administrator-managed.
    pub async fn can_modify_service(&self, principal: &Principal, service_id: Uuid) -> PolicyResult<bool> {
        if principal.is_admin() {
            return Ok(true);
        }

        self.is_owner_of_service(principal, service_id).await
    }

    pub async fn is_owner_of_service(&self, principal: &Principal, service_id: Uuid) -> PolicyResult<bool> {
        let Some(account_id) = self.current_account_id(principal).await? else {
            return Ok(false);
        };

        let Some(service) = self.repositories.services.find_service_by_id(service_id).await? else {
            return Ok(false);
        };

        let Some(professional_id) = service.professional_id else {
            return Ok(false);
        };

        let owner = self
            .repositories
            .professionals
            .find_professional_by_id(professional_id)
            .await?
            .map(|professional| professional.account_id);

        Ok(owner == Some(account_id))
    }

    pub async fn can_modify_user(&self, principal: &Principal, user_id: Uuid) -> PolicyResult<bool> {
        if principal.is_admin() {
            return Ok(true);
        }

        Ok(self.current_account_id(principal).await? == Some(user_id))
    }

    /// Professional records are administrator-managed.
    pub fn can_modify_professional(&self, principal: &Principal, _professional_id: Uuid) -> bool {
        principal.is_admin()
    }
}
