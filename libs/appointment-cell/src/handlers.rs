// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Principal, User};
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentStatus};

use crate::models::{
    AppointmentQueryParams, BookAppointmentRequest, RangeQuery, RescheduleAppointmentRequest,
    StatusChangeRequest, UpcomingAppointmentsQuery, UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

/// Shared state for the appointment routes.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

impl SchedulingState {
    pub fn new(config: Arc<AppConfig>, booking: AppointmentBookingService) -> Self {
        Self {
            config,
            booking: Arc::new(booking),
        }
    }
}

fn listing(appointments: Vec<Appointment>) -> Json<Value> {
    Json(json!({
        "total": appointments.len(),
        "appointments": appointments,
    }))
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, AppError> {
    raw.parse::<AppointmentStatus>().map_err(AppError::BadRequest)
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state.booking.book_appointment(&principal, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

// ==============================================================================
// READS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state.booking.get_appointment(&principal, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment_details(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let details = state.booking.get_appointment_details(&principal, appointment_id).await?;

    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<SchedulingState>,
    Query(params): Query<AppointmentQueryParams>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointments = state.booking.list_appointments(&principal, params.into()).await?;

    Ok(listing(appointments))
}

#[axum::debug_handler]
pub async fn list_in_range(
    State(state): State<SchedulingState>,
    Query(range): Query<RangeQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointments = state.booking.list_in_range(&principal, range.start, range.end).await?;

    Ok(listing(appointments))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<SchedulingState>,
    Query(params): Query<UpcomingAppointmentsQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointments = state.booking.list_upcoming(&principal, params.hours_ahead).await?;

    Ok(listing(appointments))
}

#[axum::debug_handler]
pub async fn get_customer_appointments(
    State(state): State<SchedulingState>,
    Path(customer_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointments = state.booking.list_by_customer(&principal, customer_id).await?;

    Ok(listing(appointments))
}

#[axum::debug_handler]
pub async fn get_professional_appointments(
    State(state): State<SchedulingState>,
    Path(professional_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointments = state.booking.list_by_professional(&principal, professional_id).await?;

    Ok(listing(appointments))
}

#[axum::debug_handler]
pub async fn get_appointments_by_status(
    State(state): State<SchedulingState>,
    Path(status): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let status = parse_status(&status)?;
    let appointments = state.booking.list_by_status(&principal, status).await?;

    Ok(listing(appointments))
}

/// Admin only.
#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let summary = state.booking.count_by_status(&principal).await?;

    Ok(Json(json!(summary)))
}

// ==============================================================================
// MUTATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state.booking.update_appointment(&principal, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state
        .booking
        .reschedule_appointment(&principal, appointment_id, request.new_start_time)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn change_status(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<StatusChangeRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state
        .booking
        .change_status(&principal, appointment_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state.booking.confirm(&principal, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment confirmed"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state.booking.cancel(&principal, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let principal = Principal::from_user(&user);
    let appointment = state.booking.complete(&principal, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

/// Administrative removal.
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let principal = Principal::from_user(&user);
    state.booking.remove_appointment(&principal, appointment_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
