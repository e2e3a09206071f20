pub mod memory;
pub mod repository;
pub mod supabase;

pub use memory::{InMemoryStore, SeedData};
pub use repository::{
    AccountRepository, AppointmentRepository, ProfessionalRepository, Repositories,
    ServiceRepository,
};
pub use supabase::{SupabaseClient, SupabaseStore};
