use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentBookingService, SchedulingState};
use shared_config::{AppConfig, StoreBackend};
use shared_database::{InMemoryStore, Repositories, SeedData, SupabaseStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Citas API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    let repositories = build_repositories(&config).await?;

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let booking = AppointmentBookingService::new(repositories, &config);
    let state = SchedulingState::new(config.clone(), booking);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn build_repositories(config: &AppConfig) -> anyhow::Result<Repositories> {
    match config.store_backend {
        StoreBackend::Supabase => {
            if !config.is_supabase_configured() {
                anyhow::bail!("STORE_BACKEND=supabase requires SUPABASE_URL and an API key");
            }
            info!("Using Supabase store at {}", config.supabase_url);
            Ok(Repositories::from_store(Arc::new(SupabaseStore::new(config))))
        }
        StoreBackend::Memory => {
            let store = match &config.seed_data_path {
                Some(path) => InMemoryStore::with_seed(SeedData::from_file(path)?).await?,
                None => {
                    warn!("No SEED_DATA_PATH set; starting with an empty in-memory store");
                    InMemoryStore::new()
                }
            };
            info!("Using in-memory store");
            Ok(Repositories::from_store(Arc::new(store)))
        }
    }
}
