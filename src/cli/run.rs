//! Handler for the `run` command.

use std::time::Duration;

use tokio::signal;
use tracing::info;

use crate::adapter::outbound::sqlite::SqliteStore;
use crate::application::{seed_catalog, PriceSimulator};
use crate::cli::RunArgs;
use crate::error::Result;
use crate::infrastructure::config::Config;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref url) = args.database {
        config.database.url = url.clone();
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    if let Some(seed) = args.seed {
        config.simulator.seed = Some(seed);
    }

    config.init_logging()?;
    info!(database = %config.database.url, "exchange-sim starting");

    let store = SqliteStore::open(&config.database.url, config.store_options())?;
    seed_catalog(&store, &config.catalog)?;

    let mut simulator = PriceSimulator::new(
        store.clone(),
        config.simulator.price_model()?,
        config.simulator.settings(),
    );
    simulator.start()?;

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(secs, "Run duration elapsed");
                }
                _ = signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
            }
        }
        None => {
            signal::ctrl_c().await?;
            info!("Shutdown signal received");
        }
    }

    simulator.stop().await;
    info!("exchange-sim stopped");
    Ok(())
}
