use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::engine::dates::{self, Zone};
use crate::models::DailyLogEntry;

/// One authoritative entry per local day, ordered by day.
pub fn authoritative_by_day<'a>(
    entries: &'a [DailyLogEntry],
    timezone: &Zone,
) -> BTreeMap<NaiveDate, &'a DailyLogEntry> {
    let mut by_day: BTreeMap<NaiveDate, &DailyLogEntry> = BTreeMap::new();
    for entry in entries {
        let day = entry.day(timezone);
        let keep_current = by_day
            .get(&day)
            .is_some_and(|current| !entry.supersedes(current));
        if !keep_current {
            by_day.insert(day, entry);
        }
    }
    by_day
}

/// A run of consecutive period days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodRun {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodRun {
    pub fn length(&self) -> i64 {
        dates::days_between(self.start, self.end) + 1
    }
}

pub fn period_runs(entries: &[DailyLogEntry], timezone: &Zone) -> Vec<PeriodRun> {
    let mut runs: Vec<PeriodRun> = Vec::new();

    let period_days = authoritative_by_day(entries, timezone)
        .into_iter()
        .filter(|(_, entry)| entry.is_period)
        .map(|(day, _)| day);

    for day in period_days {
        match runs.last_mut() {
            Some(run) if dates::days_between(run.end, day) <= 1 => run.end = day,
            _ => runs.push(PeriodRun { start: day, end: day }),
        }
    }

    runs
}

/// Distinct period-start dates, oldest first.
pub fn detect_cycle_starts(entries: &[DailyLogEntry], timezone: &Zone) -> Vec<NaiveDate> {
    let starts: Vec<NaiveDate> = period_runs(entries, timezone)
        .into_iter()
        .map(|run| run.start)
        .collect();
    tracing::debug!(entries = entries.len(), starts = starts.len(), "detected cycle starts");
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn utc() -> Zone {
        Zone::utc()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn period(id: i64, day: &str) -> DailyLogEntry {
        let mut entry = DailyLogEntry::new(Uuid::nil(), date(day), &utc());
        entry.id = id;
        entry.is_period = true;
        entry
    }

    #[test]
    fn collapses_consecutive_days_into_one_start() {
        let logs = vec![
            period(1, "2026-01-01"),
            period(2, "2026-01-02"),
            period(3, "2026-01-03"),
            period(4, "2026-01-29"),
            period(5, "2026-01-30"),
        ];
        assert_eq!(
            detect_cycle_starts(&logs, &utc()),
            vec![date("2026-01-01"), date("2026-01-29")]
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let logs = vec![
            period(5, "2026-01-30"),
            period(1, "2026-01-01"),
            period(4, "2026-01-29"),
            period(2, "2026-01-02"),
        ];
        let runs = period_runs(&logs, &utc());
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].length(), 2);
        assert_eq!(runs[1], PeriodRun { start: date("2026-01-29"), end: date("2026-01-30") });
    }

    #[test]
    fn one_day_gap_starts_new_cycle() {
        let logs = vec![period(1, "2026-01-01"), period(2, "2026-01-03")];
        assert_eq!(detect_cycle_starts(&logs, &utc()).len(), 2);
    }

    #[test]
    fn superseded_duplicate_does_not_count() {
        let mut stale = period(10, "2026-02-17");
        stale.date = Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0).unwrap();
        let mut fresh = period(20, "2026-02-17");
        fresh.date = Utc.with_ymd_and_hms(2026, 2, 17, 20, 0, 0).unwrap();
        fresh.is_period = false;

        assert!(detect_cycle_starts(&[stale.clone(), fresh.clone()], &utc()).is_empty());
        assert!(detect_cycle_starts(&[fresh, stale], &utc()).is_empty());
    }

    #[test]
    fn equal_timestamps_fall_back_to_id() {
        let mut low = period(30, "2026-02-18");
        low.date = Utc.with_ymd_and_hms(2026, 2, 18, 9, 0, 0).unwrap();
        let mut high = low.clone();
        high.id = 31;
        high.is_period = false;

        let pair = [high, low];
        let by_day = authoritative_by_day(&pair, &utc());
        assert_eq!(by_day[&date("2026-02-18")].id, 31);
    }
}
