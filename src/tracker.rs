//! Per-request pipelines: fetch logs, detect cycles, compute stats, merge the
//! baseline, then classify or project. Nothing here outlives the call.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::autofill::{auto_fill_following_days, should_auto_fill};
use crate::engine::baseline::apply_baseline;
use crate::engine::calendar::{build_calendar_day_states, grid_bounds};
use crate::engine::dates::{add_days, normalize_to_calendar_day};
use crate::engine::stats::compute_cycle_stats;
use crate::error::Result;
use crate::models::{CycleStats, DailyLogEntry, MonthView, UserCycleSettings};
use crate::store::LogStore;

async fn history<S: LogStore>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Vec<DailyLogEntry>> {
    let today = normalize_to_calendar_day(&now, &config.timezone);
    store
        .fetch_range(user_id, add_days(today, -config.history_days), today)
        .await
}

/// Merged statistics for `settings.user_id` as of `now`.
pub async fn current_stats<S: LogStore>(
    store: &S,
    settings: &UserCycleSettings,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<CycleStats> {
    let logs = history(store, settings.user_id, now, config).await?;
    let stats = compute_cycle_stats(settings, &logs, now, config);
    Ok(apply_baseline(settings, &logs, stats, now, config))
}

/// Statistics plus the painted grid for the month containing `month`.
pub async fn month_view<S: LogStore>(
    store: &S,
    settings: &UserCycleSettings,
    month: NaiveDate,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<MonthView> {
    let stats = current_stats(store, settings, now, config).await?;

    let (grid_start, grid_end) = grid_bounds(month, config.week_start);
    let mut logs = store
        .fetch_range(settings.user_id, grid_start, grid_end)
        .await?;
    if !settings.role.sees_symptoms() {
        for entry in &mut logs {
            entry.symptom_ids.clear();
        }
    }

    let days = build_calendar_day_states(month, &logs, &stats, now, config);
    Ok(MonthView {
        year: month.year(),
        month: month.month(),
        stats,
        days,
    })
}

/// Stores one day observation, extends a fresh period start into a full
/// run when the user has auto-fill on, and refreshes the stored last
/// period start.
pub async fn record_day<S: LogStore>(
    store: &S,
    settings: &UserCycleSettings,
    entry: DailyLogEntry,
    config: &EngineConfig,
) -> Result<DailyLogEntry> {
    let user_id = entry.user_id;
    let day = entry.day(&config.timezone);

    let was_period = store
        .fetch_by_day(user_id, day)
        .await?
        .is_some_and(|existing| existing.is_period);

    let saved = store.upsert(entry).await?;

    if saved.is_period
        && should_auto_fill(
            store,
            user_id,
            day,
            was_period,
            settings.auto_period_fill,
            settings.period_length,
        )
        .await?
    {
        auto_fill_following_days(
            store,
            user_id,
            day,
            settings.period_length,
            saved.flow,
            &config.timezone,
        )
        .await?;
    }

    store.refresh_last_period_start(user_id).await?;
    Ok(saved)
}

/// Deletes every row on `day` and refreshes the stored last period start.
pub async fn clear_day<S: LogStore>(store: &S, user_id: Uuid, day: NaiveDate) -> Result<()> {
    store.delete_by_day(user_id, day).await?;
    store.refresh_last_period_start(user_id).await?;
    Ok(())
}
