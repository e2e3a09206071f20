use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::scheduling::{
    Account, Appointment, AppointmentQuery, AppointmentStatus, Professional, Service, StatusCount,
};

use crate::repository::{
    AccountRepository, AppointmentRepository, ProfessionalRepository, ServiceRepository,
};

/// Reference data loaded into the in-memory store at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub professionals: Vec<Professional>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed data from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed data in {}", path.display()))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    accounts: HashMap<Uuid, Account>,
    professionals: HashMap<Uuid, Professional>,
    services: HashMap<Uuid, Service>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Process-local store used for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_seed(seed: SeedData) -> Result<Self> {
        let store = Self::new();
        store.load_seed(seed).await?;
        Ok(store)
    }

    pub async fn load_seed(&self, seed: SeedData) -> Result<()> {
        info!(
            "Loading seed data: {} accounts, {} professionals, {} services",
            seed.accounts.len(),
            seed.professionals.len(),
            seed.services.len()
        );

        for account in seed.accounts {
            self.insert_account(account).await?;
        }
        for professional in seed.professionals {
            self.insert_professional(professional).await?;
        }
        for service in seed.services {
            self.insert_service(service).await;
        }

        Ok(())
    }

    /// Emails are unique, compared case-insensitively.
    pub async fn insert_account(&self, account: Account) -> Result<()> {
        let mut state = self.state.write().await;

        if state
            .accounts
            .values()
            .any(|a| a.id != account.id && a.email.eq_ignore_ascii_case(&account.email))
        {
            bail!("Account email already registered: {}", account.email);
        }

        state.accounts.insert(account.id, account);
        Ok(())
    }

    /// One professional profile per account.
    pub async fn insert_professional(&self, professional: Professional) -> Result<()> {
        let mut state = self.state.write().await;

        if state
            .professionals
            .values()
            .any(|p| p.id != professional.id && p.account_id == professional.account_id)
        {
            bail!("Account {} already owns a professional profile", professional.account_id);
        }

        state.professionals.insert(professional.id, professional);
        Ok(())
    }

    pub async fn insert_service(&self, service: Service) {
        self.state.write().await.services.insert(service.id, service);
    }

    async fn exists_in_window<F>(
        &self,
        belongs_to_party: F,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> bool
    where
        F: Fn(&Appointment) -> bool,
    {
        self.state.read().await.appointments.values().any(|appointment| {
            Some(appointment.id) != exclude_appointment_id
                && appointment.status.occupies_window()
                && belongs_to_party(appointment)
                && appointment.overlaps(start, end)
        })
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .state
            .read()
            .await
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }
}

#[async_trait]
impl ProfessionalRepository for InMemoryStore {
    async fn find_professional_by_id(&self, id: Uuid) -> Result<Option<Professional>> {
        Ok(self.state.read().await.professionals.get(&id).cloned())
    }

    async fn find_professional_by_account_id(&self, account_id: Uuid) -> Result<Option<Professional>> {
        Ok(self
            .state
            .read()
            .await
            .professionals
            .values()
            .find(|professional| professional.account_id == account_id)
            .cloned())
    }
}

#[async_trait]
impl ServiceRepository for InMemoryStore {
    async fn find_service_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        Ok(self.state.read().await.services.get(&id).cloned())
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn save_appointment(&self, appointment: &Appointment) -> Result<Appointment> {
        debug!("Saving appointment {} ({})", appointment.id, appointment.status);
        self.state
            .write()
            .await
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.appointments.remove(&id).is_some())
    }

    async fn find_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .state
            .read()
            .await
            .appointments
            .values()
            .filter(|appointment| query.matches(appointment))
            .cloned()
            .collect();

        appointments.sort_by_key(|appointment| (appointment.start_time, appointment.id));
        Ok(appointments)
    }

    async fn exists_appointment_for_professional_in_window(
        &self,
        professional_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self
            .exists_in_window(
                |appointment| appointment.professional_id == professional_id,
                start,
                end,
                exclude_appointment_id,
            )
            .await)
    }

    async fn exists_appointment_for_customer_in_window(
        &self,
        customer_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self
            .exists_in_window(
                |appointment| appointment.customer_id == customer_id,
                start,
                end,
                exclude_appointment_id,
            )
            .await)
    }

    async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
        let state = self.state.read().await;

        Ok(AppointmentStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: state
                    .appointments
                    .values()
                    .filter(|appointment| appointment.status == *status)
                    .count() as u64,
            })
            .collect())
    }
}
