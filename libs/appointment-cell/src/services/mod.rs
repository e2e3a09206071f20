pub mod booking;
pub mod conflict;
pub mod duration;
pub mod lifecycle;
pub mod locks;
