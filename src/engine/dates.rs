//! Calendar-day arithmetic in a configured timezone.
//!
//! Stored timestamps carry whatever time of day and offset the client sent.
//! Everything above this module compares `NaiveDate`s obtained here, never
//! raw timestamps.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// Timezone used to cut timestamps into calendar days: a named IANA zone
/// (daylight saving aware) or a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Named(Tz::UTC)
    }
}

impl Default for Zone {
    fn default() -> Self {
        Zone::utc()
    }
}

impl From<Tz> for Zone {
    fn from(tz: Tz) -> Self {
        Zone::Named(tz)
    }
}

impl From<FixedOffset> for Zone {
    fn from(offset: FixedOffset) -> Self {
        Zone::Fixed(offset)
    }
}

impl FromStr for Zone {
    type Err = String;

    /// `Europe/Istanbul`, `UTC`, or an offset such as `+03:00`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(tz) = s.parse::<Tz>() {
            return Ok(Zone::Named(tz));
        }
        s.parse::<FixedOffset>()
            .map(Zone::Fixed)
            .map_err(|_| s.to_string())
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Named(tz) => write!(f, "{}", tz.name()),
            Zone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

fn local_day<T: TimeZone, Z: TimeZone>(timestamp: &DateTime<T>, zone: &Z) -> NaiveDate {
    timestamp.with_timezone(zone).date_naive()
}

/// First instant whose local day is `day`. Local midnight may fall in a
/// daylight-saving gap, in which case the day opens at the first valid
/// local time after it.
fn local_start<Z: TimeZone>(day: NaiveDate, zone: &Z) -> DateTime<Utc> {
    let midnight: NaiveDateTime = day.and_time(NaiveTime::MIN);
    (0..=24 * 4)
        .map(|quarter| midnight + Duration::minutes(15 * quarter))
        .find_map(|local| zone.from_local_datetime(&local).earliest())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Truncates `timestamp` to its calendar day as seen in `zone`.
pub fn normalize_to_calendar_day<T: TimeZone>(timestamp: &DateTime<T>, zone: &Zone) -> NaiveDate {
    match zone {
        Zone::Named(tz) => local_day(timestamp, tz),
        Zone::Fixed(offset) => local_day(timestamp, offset),
    }
}

/// Absolute `[start, end)` bounds of local `day`. `end` is the start of the
/// next local day, so days that gain or lose an hour to daylight saving are
/// 25 or 23 hours long.
pub fn day_boundaries(day: NaiveDate, zone: &Zone) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = day + Duration::days(1);
    match zone {
        Zone::Named(tz) => (local_start(day, tz), local_start(next, tz)),
        Zone::Fixed(offset) => (local_start(day, offset), local_start(next, offset)),
    }
}

/// False when either side is unset.
pub fn same_calendar_day(a: Option<NaiveDate>, b: Option<NaiveDate>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// `start <= day <= end`, false when any bound is unset.
pub fn between_inclusive(day: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => start <= day && day <= end,
        _ => false,
    }
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

pub fn add_days(day: NaiveDate, days: i64) -> NaiveDate {
    day + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn plus3() -> Zone {
        Zone::from(FixedOffset::east_opt(3 * 3600).unwrap())
    }

    fn berlin() -> Zone {
        "Europe/Berlin".parse().unwrap()
    }

    #[test]
    fn late_utc_evening_is_next_local_day() {
        let stored = Utc.with_ymd_and_hms(2026, 3, 4, 21, 0, 0).unwrap();
        assert_eq!(normalize_to_calendar_day(&stored, &plus3()), date("2026-03-05"));

        assert_eq!(normalize_to_calendar_day(&stored, &Zone::utc()), date("2026-03-04"));
    }

    #[test]
    fn boundaries_cover_one_local_day() {
        let (start, end) = day_boundaries(date("2026-03-05"), &plus3());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 4, 21, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 5, 21, 0, 0).unwrap());

        let west = Zone::from(FixedOffset::west_opt(5 * 3600).unwrap());
        let (start, _) = day_boundaries(date("2026-03-05"), &west);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 5, 5, 0, 0).unwrap());
    }

    #[test]
    fn parses_named_zones_and_offsets() {
        assert_eq!("Europe/Istanbul".parse::<Zone>().unwrap(), Zone::Named(chrono_tz::Europe::Istanbul));
        assert_eq!("UTC".parse::<Zone>().unwrap(), Zone::utc());
        assert_eq!(
            "+03:00".parse::<Zone>().unwrap(),
            Zone::Fixed(FixedOffset::east_opt(3 * 3600).unwrap())
        );
        assert!("Mars/Olympus".parse::<Zone>().is_err());
    }

    #[test]
    fn summer_time_shifts_the_local_day() {
        // 22:30Z is 23:30 in Berlin winter but 00:30 the next day in summer
        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 22, 30, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2026, 7, 1, 22, 30, 0).unwrap();
        assert_eq!(normalize_to_calendar_day(&winter, &berlin()), date("2026-01-15"));
        assert_eq!(normalize_to_calendar_day(&summer, &berlin()), date("2026-07-02"));
    }

    #[test]
    fn daylight_saving_days_are_23_and_25_hours() {
        let (start, end) = day_boundaries(date("2026-03-29"), &berlin());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 28, 23, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 29, 22, 0, 0).unwrap());

        let (start, end) = day_boundaries(date("2026-10-25"), &berlin());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 24, 22, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 10, 25, 23, 0, 0).unwrap());
    }

    #[test]
    fn unset_bounds_never_match() {
        let day = date("2026-01-10");
        assert!(!same_calendar_day(Some(day), None));
        assert!(!same_calendar_day(None, None));
        assert!(same_calendar_day(Some(day), Some(day)));

        assert!(!between_inclusive(day, None, Some(day)));
        assert!(!between_inclusive(day, Some(day), None));
        assert!(between_inclusive(day, Some(date("2026-01-10")), Some(date("2026-01-12"))));
        assert!(between_inclusive(day, Some(date("2026-01-08")), Some(date("2026-01-10"))));
        assert!(!between_inclusive(day, Some(date("2026-01-11")), Some(date("2026-01-12"))));
    }
}
