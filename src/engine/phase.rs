use chrono::NaiveDate;

use crate::engine::dates::{add_days, between_inclusive, same_calendar_day, Zone};
use crate::models::{CycleStats, DailyLogEntry, Phase};

/// Classifies `day` against a stats snapshot. First matching rule wins:
/// a logged period day, the days covered by the last period, an impossible
/// estimate, then position relative to ovulation and the fertility window.
pub fn detect_phase(
    stats: &CycleStats,
    logs: &[DailyLogEntry],
    day: NaiveDate,
    timezone: &Zone,
) -> Phase {
    if logs
        .iter()
        .any(|entry| entry.is_period && entry.day(timezone) == day)
    {
        return Phase::Menstrual;
    }

    if let Some(start) = stats.last_period_start {
        let end = add_days(start, stats.period_length() - 1);
        if between_inclusive(day, Some(start), Some(end)) {
            return Phase::Menstrual;
        }
    }

    if stats.ovulation_impossible {
        return Phase::Unknown;
    }

    let Some(ovulation) = stats.ovulation_date else {
        return Phase::Unknown;
    };

    if same_calendar_day(Some(day), Some(ovulation)) {
        Phase::Ovulation
    } else if between_inclusive(day, stats.fertility_window_start, stats.fertility_window_end) {
        Phase::Fertile
    } else if day < ovulation {
        Phase::Follicular
    } else {
        Phase::Luteal
    }
}
