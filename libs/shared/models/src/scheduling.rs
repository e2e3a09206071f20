use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

// ==============================================================================
// REFERENCED RESOURCES (owned by the surrounding CRUD layers)
// ==============================================================================

/// A registered account. Customers are accounts; principals resolve to
/// accounts through their email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub account_id: Uuid,
    pub specialty: Option<String>,
    pub available_hours: Option<String>,
}

/// A bookable offering. `duration` is free text ("30 min", "1 hora") and is
/// interpreted at booking time. Services without a professional are global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub price: Option<f64>,
    pub professional_id: Option<Uuid>,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AppointmentStatus {
    #[serde(rename = "PENDIENTE", alias = "PENDING")]
    Pending,
    #[serde(rename = "CONFIRMADA", alias = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "CANCELADA", alias = "CANCELLED")]
    Cancelled,
    #[serde(rename = "COMPLETADA", alias = "COMPLETED")]
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    /// Wire name used in JSON bodies, paths and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDIENTE",
            AppointmentStatus::Confirmed => "CONFIRMADA",
            AppointmentStatus::Cancelled => "CANCELADA",
            AppointmentStatus::Completed => "COMPLETADA",
        }
    }

    /// Cancelled appointments release their window.
    pub fn occupies_window(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "PENDIENTE" | "PENDING" => Ok(AppointmentStatus::Pending),
            "CONFIRMADA" | "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "CANCELADA" | "CANCELLED" | "CANCELED" => Ok(AppointmentStatus::Cancelled),
            "COMPLETADA" | "COMPLETED" => Ok(AppointmentStatus::Completed),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

/// One booking. Holds references only; the customer, service and
/// professional aggregates are resolved through lookups when needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub professional_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn pending(
        customer_id: Uuid,
        service_id: Uuid,
        professional_id: Uuid,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            service_id,
            professional_id,
            start_time,
            end_time,
            status: AppointmentStatus::Pending,
        }
    }

    /// End of a window of `minutes` starting at `start`, or `None` when it
    /// falls outside the representable calendar.
    pub fn window_end(start: NaiveDateTime, minutes: i64) -> Option<NaiveDateTime> {
        Duration::try_minutes(minutes).and_then(|length| start.checked_add_signed(length))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Closed-interval overlap: touching windows count as overlapping.
    pub fn overlaps(&self, window_start: NaiveDateTime, window_end: NaiveDateTime) -> bool {
        self.start_time <= window_end && window_start <= self.end_time
    }
}

/// Filter for appointment listings. Every present field must match; the
/// time bounds apply to the start time and are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub customer_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl AppointmentQuery {
    pub fn for_customer(customer_id: Uuid) -> Self {
        Self { customer_id: Some(customer_id), ..Self::default() }
    }

    pub fn for_professional(professional_id: Uuid) -> Self {
        Self { professional_id: Some(professional_id), ..Self::default() }
    }

    pub fn with_status(status: AppointmentStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn between(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self { from: Some(from), to: Some(to), ..Self::default() }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.customer_id.map_or(true, |id| appointment.customer_id == id)
            && self.professional_id.map_or(true, |id| appointment.professional_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.from.map_or(true, |from| appointment.start_time >= from)
            && self.to.map_or(true, |to| appointment.start_time <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: AppointmentStatus,
    pub count: u64,
}
