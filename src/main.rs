mod config;
mod engine;
mod error;
mod exec;
mod fx;
mod orchestrator;
mod persistence;
mod pipeline;
mod price;
mod types;
mod venues;

use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use config::Config;
use orchestrator::Orchestrator;
use persistence::{InMemoryStore, Store};
use venues::venue_a::VenueAClient;
use venues::venue_b::VenueBClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG=info (or debug) to see output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    dotenv().ok();

    let cfg = Config::from_env();
    tracing::info!(mode = ?cfg.exec_mode, "starting arbitrage engine");

    let venue_a = Arc::new(VenueAClient::new(
        cfg.venue_a_api_key.clone(),
        cfg.venue_a_api_secret.clone(),
    ));
    let venue_b = Arc::new(VenueBClient::new(
        cfg.venue_b_api_key.clone(),
        cfg.venue_b_api_secret.clone(),
        cfg.venue_b_base_url.clone(),
    ));
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());

    let mut orchestrator = Orchestrator::new(cfg, venue_a.clone(), venue_b.clone(), store.clone());
    let price_service = orchestrator.price_service();

    {
        let price_service = price_service.clone();
        let venue_a = venue_a.clone();
        tokio::spawn(async move {
            price_service.run_venue_a_poller(venue_a).await;
        });
    }

    {
        let price_service = price_service.clone();
        tokio::spawn(async move {
            price_service.run_venue_b_streamer().await;
        });
    }

    {
        let handle = orchestrator.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, requesting shutdown");
                handle.stop();
            }
        });
    }

    orchestrator.run().await;

    Ok(())
}
