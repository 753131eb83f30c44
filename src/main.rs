use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;

use cycle_engine::config::AppConfig;
use cycle_engine::store::{LogStore, PgStore, SettingsStore};
use cycle_engine::tracker;

/// Maintenance pass: bring the schema up to date, then recompute every
/// owner's stored last period start and log their merged statistics.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    let store = PgStore::connect(&config.database_url, config.max_connections, config.engine.timezone).await?;
    store.migrate().await?;

    let now = Utc::now();
    let owners = store.owner_ids().await?;
    tracing::info!("🧠 Refreshing {} owners ({})", owners.len(), config.engine.timezone);

    for user_id in owners {
        store.refresh_last_period_start(user_id).await?;

        let Some(settings) = store.load_settings(user_id).await? else {
            continue;
        };
        let stats = tracker::current_stats(&store, &settings, now, &config.engine).await?;

        tracing::info!(
            %user_id,
            cycle_day = stats.current_cycle_day,
            phase = ?stats.current_phase,
            next_period = ?stats.next_period_start,
            ovulation_impossible = stats.ovulation_impossible,
            "✅ refreshed"
        );
    }

    Ok(())
}
