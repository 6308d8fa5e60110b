use anyhow::Result;
use rust_trip_planner::cities::ALLOWED_CITIES;
use rust_trip_planner::proxy::populate_lodging;
use rust_trip_planner::{logging, open_default_store, Config, SearchProxyClient, StaticIdentity};

/// Fill the lodging catalog from the accommodation search proxy, one query
/// per supported city
#[tokio::main]
async fn main() -> Result<()> {
    logging::init_stderr_logging()?;
    println!("🚀 Starting catalog population...");

    let config = Config::from_env();
    let identity = StaticIdentity::from_option(config.user_id.clone());
    let proxy = SearchProxyClient::from_config(&config);
    let store = open_default_store(&config).await?;

    println!("📊 Catalog: {}", config.catalog_path.display());
    println!("📊 Search proxy: {}", config.search_proxy_url);

    let mut total = 0;
    let mut failed = Vec::new();

    for city in ALLOWED_CITIES {
        let listings = match proxy.search(city).await {
            Ok(listings) => listings,
            Err(e) => {
                println!("  {} -> Error: {}", city, e);
                failed.push(*city);
                continue;
            }
        };

        let stored = populate_lodging(&*store, &identity, city, &listings).await?;
        println!("  {} -> {} of {} listings stored", city, stored, listings.len());
        total += stored;
    }

    println!("\n✅ Catalog populated");
    println!("📊 Total accommodations stored: {}", total);
    if !failed.is_empty() {
        println!("⚠️  Cities that failed: {}", failed.join(", "));
    }

    Ok(())
}
