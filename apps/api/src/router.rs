use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, SchedulingState};

pub fn create_router(state: SchedulingState) -> Router {
    Router::new()
        .route("/", get(|| async { "Citas API is running!" }))
        .nest("/api/appointments", appointment_routes(state))
}
