//! Clinic Commerce - cart, checkout and order service

use anyhow::Result;
use clinic_commerce::{
    events::EventPublisher,
    payments::{PaymentGateway, StripeGateway},
    router,
    store::{MemoryStore, PgStore},
    AppConfig, AppState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    let payments = config.payment_api_key.clone().map(|key| Arc::new(StripeGateway::new(key, config.payment_api_base.clone())) as Arc<dyn PaymentGateway>);
    if payments.is_none() {
        warn!("PAYMENT_API_KEY not set, payment intents are disabled");
    }

    let state = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            AppState::new(Arc::new(PgStore::new(db)), payments, events, &config.currency)
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            AppState::new(Arc::new(MemoryStore::new()), payments, events, &config.currency)
        }
    };

    let app = router(state);
    info!("Clinic Commerce listening on port {}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
