use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::engine::cycle_starts::detect_cycle_starts;
use crate::engine::dates::normalize_to_calendar_day;
use crate::engine::stats::{apply_estimate, declared_period_length, estimate_ovulation, finish};
use crate::models::{CycleStats, DailyLogEntry, UserCycleSettings};

/// Detected starts needed before observed lengths are trusted over the
/// user's declared ones.
pub const MIN_RELIABLE_CYCLE_STARTS: usize = 2;

/// Reconciles computed statistics with the user's declared defaults.
///
/// Sparse histories adopt the declared cycle and period lengths; histories
/// with enough detected starts keep their observed values. Partners get
/// `stats` back untouched.
pub fn apply_baseline(
    settings: &UserCycleSettings,
    logs: &[DailyLogEntry],
    stats: CycleStats,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> CycleStats {
    if !settings.role.receives_baseline() {
        tracing::debug!(user_id = %settings.user_id, "partner view, baseline skipped");
        return stats;
    }

    let timezone = &config.timezone;
    let today = normalize_to_calendar_day(&now, timezone);
    let starts = detect_cycle_starts(logs, timezone);
    let reliable = starts.len() >= MIN_RELIABLE_CYCLE_STARTS;
    let detected_last = starts.last().copied();

    let mut merged = stats;

    if !reliable {
        if settings.cycle_length > 0 {
            merged.average_cycle_length = f64::from(settings.cycle_length);
            merged.median_cycle_length = settings.cycle_length;
        }
        if settings.period_length > 0 {
            merged.average_period_length = f64::from(settings.period_length);
        }
        merged.last_period_start = detected_last.or(settings.last_period_start);
    }

    let cycle_length = merged.cycle_length();
    // Literal OR: a reliable history that already has a prediction keeps it.
    let needs_prediction = !reliable || merged.next_period_start.is_none();

    if let Some(last) = merged.last_period_start {
        if cycle_length > 0 && needs_prediction {
            let estimate = estimate_ovulation(
                last,
                cycle_length,
                declared_period_length(settings, &merged),
                config.luteal_phase_days,
            );
            apply_estimate(&mut merged, &estimate, detected_last == Some(last));
        }
    }

    finish(&mut merged, logs, today, timezone);

    tracing::debug!(
        user_id = %settings.user_id,
        reliable,
        cycle_length,
        cycle_day = merged.current_cycle_day,
        "applied baseline"
    );
    merged
}
