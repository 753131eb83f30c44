use chrono::{DateTime, NaiveDate, Utc};

use crate::config::EngineConfig;
use crate::engine::cycle_starts::period_runs;
use crate::engine::dates::{add_days, days_between, normalize_to_calendar_day, Zone};
use crate::engine::phase::detect_phase;
use crate::models::{CycleStats, DailyLogEntry, UserCycleSettings};

/// Days before ovulation that count as fertile.
pub const FERTILE_DAYS_BEFORE: i64 = 5;
/// Days after ovulation that count as fertile.
pub const FERTILE_DAYS_AFTER: i64 = 1;

/// Day deltas between consecutive cycle starts.
pub fn cycle_lengths(starts: &[NaiveDate]) -> Vec<i64> {
    starts
        .windows(2)
        .map(|w| days_between(w[0], w[1]))
        .collect()
}

pub fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Middle value; for an even count the two middle values are averaged and
/// rounded half away from zero.
pub fn median(values: &[i64]) -> i32 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        ((sorted[mid - 1] + sorted[mid]) as f64 / 2.0).round() as i32
    } else {
        sorted[mid] as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvulationEstimate {
    pub next_period_start: NaiveDate,
    pub ovulation_date: Option<NaiveDate>,
    pub fertility_window: Option<(NaiveDate, NaiveDate)>,
    pub impossible: bool,
}

/// Back-computes ovulation from the predicted next period.
///
/// When the ovulation day would land on or before the last day of the
/// period that opened the cycle, the estimate is marked impossible and
/// carries no ovulation or fertility dates.
pub fn estimate_ovulation(
    last_period_start: NaiveDate,
    cycle_length: i64,
    period_length: i64,
    luteal_phase_days: i64,
) -> OvulationEstimate {
    let next_period_start = add_days(last_period_start, cycle_length);
    let ovulation = add_days(next_period_start, -luteal_phase_days);
    let period_end = add_days(last_period_start, period_length.max(1) - 1);

    if ovulation <= period_end {
        tracing::warn!(
            cycle_length,
            period_length,
            luteal_phase_days,
            "ovulation would fall inside the period; no estimate"
        );
        return OvulationEstimate {
            next_period_start,
            ovulation_date: None,
            fertility_window: None,
            impossible: true,
        };
    }

    OvulationEstimate {
        next_period_start,
        ovulation_date: Some(ovulation),
        fertility_window: Some((
            add_days(ovulation, -FERTILE_DAYS_BEFORE),
            add_days(ovulation, FERTILE_DAYS_AFTER),
        )),
        impossible: false,
    }
}

/// Copies an estimate onto `stats`. `exact` says whether the anchor came
/// from detected cycle data rather than an onboarding guess.
pub fn apply_estimate(stats: &mut CycleStats, estimate: &OvulationEstimate, exact: bool) {
    stats.next_period_start = Some(estimate.next_period_start);
    stats.ovulation_date = estimate.ovulation_date;
    stats.fertility_window_start = estimate.fertility_window.map(|(start, _)| start);
    stats.fertility_window_end = estimate.fertility_window.map(|(_, end)| end);
    stats.ovulation_impossible = estimate.impossible;
    stats.ovulation_exact = exact && !estimate.impossible;
}

/// Period length checked against ovulation: the declared one when set,
/// otherwise what the logs show.
pub fn declared_period_length(settings: &UserCycleSettings, stats: &CycleStats) -> i64 {
    if settings.period_length > 0 {
        i64::from(settings.period_length)
    } else {
        stats.period_length()
    }
}

/// 1-based day of the cycle containing `today`, with `last_period_start`
/// projected forward by whole cycles. 0 when unknown or not yet begun.
pub fn current_cycle_day(last_period_start: Option<NaiveDate>, cycle_length: i64, today: NaiveDate) -> i32 {
    let Some(start) = last_period_start else {
        return 0;
    };
    let elapsed = days_between(start, today);
    if elapsed < 0 {
        return 0;
    }
    let into_cycle = if cycle_length > 0 {
        elapsed % cycle_length
    } else {
        elapsed
    };
    (into_cycle + 1) as i32
}

/// Fills the fields that depend on "today".
pub(crate) fn finish(stats: &mut CycleStats, logs: &[DailyLogEntry], today: NaiveDate, timezone: &Zone) {
    stats.current_cycle_day = current_cycle_day(stats.last_period_start, stats.cycle_length(), today);
    stats.current_phase = detect_phase(stats, logs, today, timezone);
}

/// Statistics from observed logs alone. Prediction fields stay unset until
/// at least two cycle starts give a measurable cycle length.
pub fn compute_cycle_stats(
    settings: &UserCycleSettings,
    logs: &[DailyLogEntry],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> CycleStats {
    let timezone = &config.timezone;
    let today = normalize_to_calendar_day(&now, timezone);

    let runs = period_runs(logs, timezone);
    let starts: Vec<NaiveDate> = runs.iter().map(|run| run.start).collect();
    let lengths = cycle_lengths(&starts);
    let run_lengths: Vec<i64> = runs.iter().map(|run| run.length()).collect();

    let mut stats = CycleStats {
        cycle_count: starts.len(),
        average_period_length: mean(&run_lengths),
        last_period_start: starts.last().copied(),
        ..CycleStats::default()
    };

    if !lengths.is_empty() {
        stats.average_cycle_length = mean(&lengths);
        stats.median_cycle_length = median(&lengths);
        stats.shortest_cycle = lengths.iter().copied().min();
        stats.longest_cycle = lengths.iter().copied().max();

        if let Some(last) = stats.last_period_start {
            let estimate = estimate_ovulation(
                last,
                stats.cycle_length(),
                declared_period_length(settings, &stats),
                config.luteal_phase_days,
            );
            apply_estimate(&mut stats, &estimate, true);
        }
    }

    finish(&mut stats, logs, today, timezone);

    tracing::debug!(
        user_id = %settings.user_id,
        cycles = stats.cycle_count,
        average = stats.average_cycle_length,
        "computed cycle stats"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn noon(s: &str) -> DateTime<Utc> {
        let d = date(s);
        Utc.from_utc_datetime(&d.and_hms_opt(12, 0, 0).unwrap())
    }

    fn period_days(start: &str, days: i64) -> Vec<DailyLogEntry> {
        let tz = EngineConfig::default().timezone;
        (0..days)
            .map(|offset| {
                let mut entry = DailyLogEntry::new(Uuid::nil(), add_days(date(start), offset), &tz);
                entry.is_period = true;
                entry
            })
            .collect()
    }

    #[test]
    fn median_of_even_count_rounds() {
        assert_eq!(median(&[27, 30]), 29);
        assert_eq!(median(&[26, 28, 30]), 28);
        assert_eq!(median(&[30, 26, 29, 28]), 29);
        assert_eq!(median(&[]), 0);
    }

    #[test]
    fn cycle_lengths_are_consecutive_deltas() {
        let starts = [date("2026-01-01"), date("2026-01-29"), date("2026-02-28")];
        assert_eq!(cycle_lengths(&starts), vec![28, 30]);
    }

    #[test]
    fn fertility_window_spans_five_before_to_one_after() {
        let estimate = estimate_ovulation(date("2026-01-01"), 28, 5, 14);
        assert!(!estimate.impossible);
        assert_eq!(estimate.next_period_start, date("2026-01-29"));
        assert_eq!(estimate.ovulation_date, Some(date("2026-01-15")));
        assert_eq!(
            estimate.fertility_window,
            Some((date("2026-01-10"), date("2026-01-16")))
        );
    }

    #[test]
    fn short_cycle_with_long_period_is_impossible() {
        let estimate = estimate_ovulation(date("2026-01-01"), 15, 10, 14);
        assert!(estimate.impossible);
        assert_eq!(estimate.ovulation_date, None);
        assert_eq!(estimate.fertility_window, None);

        let mut stats = CycleStats::default();
        apply_estimate(&mut stats, &estimate, true);
        assert!(stats.ovulation_impossible);
        assert!(!stats.ovulation_exact);
        assert_eq!(stats.ovulation_date, None);
        assert_eq!(stats.fertility_window_start, None);
        assert_eq!(stats.fertility_window_end, None);
    }

    #[test]
    fn cycle_day_projects_across_elapsed_cycles() {
        let start = Some(date("2026-01-01"));
        assert_eq!(current_cycle_day(start, 28, date("2026-01-01")), 1);
        assert_eq!(current_cycle_day(start, 28, date("2026-01-28")), 28);
        assert_eq!(current_cycle_day(start, 28, date("2026-01-29")), 1);
        assert_eq!(current_cycle_day(start, 28, date("2026-03-01")), 4);
        assert_eq!(current_cycle_day(start, 0, date("2026-03-01")), 60);
        assert_eq!(current_cycle_day(start, 28, date("2025-12-31")), 0);
        assert_eq!(current_cycle_day(None, 28, date("2026-01-01")), 0);
    }

    #[test]
    fn observed_cycles_drive_predictions() {
        let mut logs = period_days("2026-01-01", 5);
        logs.extend(period_days("2026-01-29", 4));
        logs.extend(period_days("2026-02-26", 4));
        let settings = UserCycleSettings::new(Uuid::nil());

        let stats = compute_cycle_stats(&settings, &logs, noon("2026-03-02"), &EngineConfig::default());
        assert_eq!(stats.cycle_count, 3);
        assert_eq!(stats.average_cycle_length, 28.0);
        assert_eq!(stats.median_cycle_length, 28);
        assert!((stats.average_period_length - 13.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.last_period_start, Some(date("2026-02-26")));
        assert_eq!(stats.next_period_start, Some(date("2026-03-26")));
        assert_eq!(stats.ovulation_date, Some(date("2026-03-12")));
        assert!(stats.ovulation_exact);
        assert_eq!(stats.current_cycle_day, 5);
        assert_eq!(stats.current_phase, Phase::Follicular);
    }

    #[test]
    fn single_start_leaves_predictions_unset() {
        let logs = period_days("2026-01-01", 3);
        let settings = UserCycleSettings::new(Uuid::nil());

        let stats = compute_cycle_stats(&settings, &logs, noon("2026-01-02"), &EngineConfig::default());
        assert_eq!(stats.cycle_count, 1);
        assert_eq!(stats.average_cycle_length, 0.0);
        assert_eq!(stats.next_period_start, None);
        assert_eq!(stats.current_cycle_day, 2);
        assert_eq!(stats.current_phase, Phase::Menstrual);
    }

    #[test]
    fn no_logs_is_unknown_not_an_error() {
        let settings = UserCycleSettings::new(Uuid::nil());
        let stats = compute_cycle_stats(&settings, &[], noon("2026-01-02"), &EngineConfig::default());
        assert_eq!(stats, CycleStats::default());
        assert_eq!(stats.current_phase, Phase::Unknown);
    }
}
