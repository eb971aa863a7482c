use anyhow::Context;
use std::env;
use std::sync::Arc;

mod admission;
mod app_state;
mod catalog;
mod handlers;
mod models;
mod store;

use crate::app_state::AppState;
use crate::catalog::Catalog;
use crate::store::{BookingStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting lashby booking backend...");

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());

    // DATABASE_URL selects the Postgres store; otherwise state lives in
    // JSON files under DATA_DIR, like the original deployment.
    let store: Arc<dyn BookingStore> = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let db = PgStore::new(&database_url)
                .await
                .context("failed to connect to database")?;
            db.init().await.context("failed to initialize database")?;
            log::info!("Database store initialized");
            Arc::new(db)
        }
        Err(_) => {
            let store = MemoryStore::open(&data_dir).context("failed to open file store")?;
            log::info!("File store initialized at {}", data_dir);
            Arc::new(store)
        }
    };

    let catalog = Catalog::load(format!("{}/offers.json", data_dir));
    let state = AppState::new(store, catalog);

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    log::info!("Listening on {}", bind_addr);

    axum::serve(listener, handlers::router(state))
        .await
        .context("server error")?;

    Ok(())
}
