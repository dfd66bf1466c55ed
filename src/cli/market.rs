//! Handler for the `market` command.

use serde::Serialize;

use crate::adapter::outbound::sqlite::SqliteStore;
use crate::cli::MarketArgs;
use crate::domain::Product;
use crate::error::{Error, Result};
use crate::infrastructure::config::Config;

#[derive(Debug, Serialize)]
struct MarketLine {
    #[serde(flatten)]
    product: Product,
    stock: i64,
    price: Option<i64>,
}

/// Print the market as a table or as JSON.
pub fn execute(args: &MarketArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let store = SqliteStore::open(&config.database.url, config.store_options())?;

    let mut lines = Vec::new();
    for entry in store.list_market()? {
        let price = match store.latest_price(entry.product.id) {
            Ok(price) => Some(price),
            Err(Error::MissingPrice { .. }) => None,
            Err(e) => return Err(e),
        };
        lines.push(MarketLine {
            product: entry.product,
            stock: entry.stock,
            price,
        });
    }

    if args.json {
        let json = serde_json::to_string_pretty(&lines)
            .map_err(|e| Error::InvalidState(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    if lines.is_empty() {
        println!("Market is empty");
        return Ok(());
    }

    println!("{:<20} {:>10} {:>10}", "PRODUCT", "STOCK", "PRICE");
    for line in lines {
        let price = line.price.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!("{:<20} {:>10} {:>10}", line.product.name, line.stock, price);
    }
    Ok(())
}
