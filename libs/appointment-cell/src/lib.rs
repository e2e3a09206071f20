pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::SchedulingState;
pub use models::*;
pub use router::appointment_routes;
pub use services::booking::AppointmentBookingService;
pub use services::duration::DurationParser;
