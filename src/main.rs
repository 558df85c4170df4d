use std::{env, sync::Arc};

use dotenvy::dotenv;
use techstore_api::{
    config::{self, database},
    core::notification::{LogNotifier, OrderMailer},
    errors::{Error, Result},
    gateway::StripeClient,
    http::{AppState, run_server},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the main application configuration
    let app_config = config::load_app_configuration()?;

    // 4. Initialize database
    let db = database::init_db(&app_config.database.url)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Payment gateway
    // STRIPE_SECRET_KEY is loaded here, directly before use, not stored in AppConfig
    let secret_key = env::var("STRIPE_SECRET_KEY")
        .inspect_err(|e| error!("STRIPE_SECRET_KEY not found: {}", e))
        .map_err(Error::EnvVar)?;
    let gateway = StripeClient::new(secret_key, &app_config.stripe)?;

    // 6. Notifications are logged, not delivered
    let mailer = OrderMailer::new(Arc::new(LogNotifier), app_config.email.clone());

    let state = AppState {
        db,
        gateway: Arc::new(gateway),
        mailer,
        config: Arc::new(app_config),
    };

    run_server(state).await
}
