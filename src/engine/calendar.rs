use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::engine::cycle_starts::authoritative_by_day;
use crate::engine::dates::{add_days, days_between, normalize_to_calendar_day};
use crate::models::{CalendarDayState, CycleStats, DailyLogEntry};

fn offset_from_week_start(day: NaiveDate, week_start: Weekday) -> i64 {
    let day = i64::from(day.weekday().num_days_from_monday());
    let start = i64::from(week_start.num_days_from_monday());
    (7 + day - start) % 7
}

/// First and last day of the 7-column grid covering the month of `month`.
pub fn grid_bounds(month: NaiveDate, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let first = month - Duration::days(i64::from(month.day0()));
    let mut last = first;
    while (last + Duration::days(1)).month() == first.month() {
        last = last + Duration::days(1);
    }

    let grid_start = add_days(first, -offset_from_week_start(first, week_start));
    let grid_end = add_days(last, 6 - offset_from_week_start(last, week_start));
    (grid_start, grid_end)
}

/// Every day of the visible grid, including spill-over from adjacent months.
pub fn month_grid(month: NaiveDate, week_start: Weekday) -> Vec<NaiveDate> {
    let (start, end) = grid_bounds(month, week_start);
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Days in `[from, to]` covered by a `span`-day event first occurring at
/// `anchor` and repeating every `cycle_length` days. Occurrences before the
/// anchor are never produced; a non-positive cycle length yields only the
/// anchor occurrence.
fn projected_days(
    anchor: NaiveDate,
    span: i64,
    cycle_length: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> BTreeSet<NaiveDate> {
    let span = span.max(1);
    let mut days = BTreeSet::new();

    let mut occurrence = anchor;
    if cycle_length > 0 {
        // skip whole cycles that end before the grid opens
        let behind = days_between(anchor, from) - (span - 1);
        if behind > 0 {
            let cycles = (behind + cycle_length - 1) / cycle_length;
            occurrence = add_days(anchor, cycles * cycle_length);
        }
    }

    while occurrence <= to {
        for offset in 0..span {
            let day = add_days(occurrence, offset);
            if day >= from && day <= to {
                days.insert(day);
            }
        }
        if cycle_length <= 0 {
            break;
        }
        occurrence = add_days(occurrence, cycle_length);
    }

    days
}

/// Builds the display state of every cell in the grid around `month`.
///
/// Predictions are projected by whole cycle lengths so months far from
/// `now` still show the period, ovulation and fertility markers of the
/// cycle they fall in. Each cell carries at most one of period, predicted,
/// ovulation and fertile, in that order of precedence.
pub fn build_calendar_day_states(
    month: NaiveDate,
    logs: &[DailyLogEntry],
    stats: &CycleStats,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<CalendarDayState> {
    let timezone = &config.timezone;
    let today = normalize_to_calendar_day(&now, timezone);
    let (grid_start, grid_end) = grid_bounds(month, config.week_start);

    let by_day = authoritative_by_day(logs, timezone);
    let cycle_length = stats.cycle_length();

    let predicted = stats
        .next_period_start
        .map(|next| projected_days(next, stats.period_length(), cycle_length, grid_start, grid_end))
        .unwrap_or_default();

    let (fertile, ovulation) = if stats.ovulation_impossible {
        (BTreeSet::new(), BTreeSet::new())
    } else {
        let fertile = match (stats.fertility_window_start, stats.fertility_window_end) {
            (Some(start), Some(end)) if start <= end => projected_days(
                start,
                days_between(start, end) + 1,
                cycle_length,
                grid_start,
                grid_end,
            ),
            _ => BTreeSet::new(),
        };
        let ovulation = stats
            .ovulation_date
            .map(|day| projected_days(day, 1, cycle_length, grid_start, grid_end))
            .unwrap_or_default();
        (fertile, ovulation)
    };

    tracing::debug!(
        %grid_start,
        %grid_end,
        predicted = predicted.len(),
        fertile = fertile.len(),
        ovulation = ovulation.len(),
        "projected calendar markers"
    );

    month_grid(month, config.week_start)
        .into_iter()
        .map(|date| {
            let entry = by_day.get(&date);
            let is_period = entry.is_some_and(|e| e.is_period);
            let is_predicted = !is_period && predicted.contains(&date);
            let is_ovulation = !is_period && !is_predicted && ovulation.contains(&date);
            let is_fertility = !is_period && !is_predicted && !is_ovulation && fertile.contains(&date);

            CalendarDayState {
                date,
                in_month: date.month() == month.month() && date.year() == month.year(),
                is_today: date == today,
                is_period,
                is_predicted,
                is_fertility,
                is_ovulation,
                has_data: entry.is_some_and(|e| e.has_data()),
            }
        })
        .collect()
}
