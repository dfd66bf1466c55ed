use std::path::Path;

use crate::error::Result;
use crate::infrastructure::config::Config;

/// Validate a configuration file without opening the store.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());

    let config = Config::load(path)?;
    println!("Configuration is valid");
    println!();
    println!("Summary:");
    println!("  Database: {}", config.database.url);
    println!("  Retention: {} records per product", config.database.retention_limit);
    println!("  Starting balance: {}", config.accounts.starting_balance);
    println!("  Tick interval: {} ms", config.simulator.tick_interval_ms);
    println!(
        "  Trend: [{}, {}], volatility {}",
        config.simulator.trend_min, config.simulator.trend_max, config.simulator.volatility
    );
    println!("  Catalog: {} products", config.catalog.len());
    Ok(())
}
