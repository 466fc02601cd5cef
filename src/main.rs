use tracing::info;

use staybook::config::Config;
use staybook::engine::Engine;
use staybook::wal::Wal;

/// Offline maintenance: replay the store, report what it holds, and compact
/// the WAL when it has grown past the threshold (or `--compact` is given).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let force = std::env::args().any(|a| a == "--compact");
    info!("staybook admin");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  compact_threshold: {}", config.compact_threshold);
    info!("  max_stay_nights: {}", config.max_stay_nights);

    let logged = Wal::replay(&config.wal_path())?.len() as u64;
    let engine = Engine::open(&config)?;
    let stats = engine.stats();
    info!(
        users = stats.users,
        listings = stats.listings,
        reservations = stats.reservations,
        wal_events = logged,
        "store loaded"
    );

    if force || logged >= config.compact_threshold {
        engine.compact().await?;
        info!("WAL compacted");
    } else {
        info!("WAL below compaction threshold, nothing to do");
    }
    Ok(())
}
