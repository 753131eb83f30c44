use chrono::NaiveDate;
use uuid::Uuid;

use crate::engine::dates::{add_days, Zone};
use crate::error::Result;
use crate::models::{DailyLogEntry, Flow};
use crate::store::LogStore;

/// A period logged within this many days before the new one means the
/// write belongs to a run that already exists.
pub const RECENT_PERIOD_GUARD_DAYS: i64 = 3;

/// Whether marking `day` as a period should extend it into a full run.
pub async fn should_auto_fill<S: LogStore>(
    store: &S,
    user_id: Uuid,
    day: NaiveDate,
    was_period: bool,
    auto_fill_enabled: bool,
    period_length: i32,
) -> Result<bool> {
    if !auto_fill_enabled || period_length <= 1 || was_period {
        return Ok(false);
    }

    for back in 1..=RECENT_PERIOD_GUARD_DAYS {
        let previous = store.fetch_by_day(user_id, add_days(day, -back)).await?;
        if previous.is_some_and(|entry| entry.is_period) {
            tracing::debug!(%user_id, %day, back, "recent period day, auto-fill skipped");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Marks the `period_length - 1` days after `day` as period days.
///
/// Empty days are created, blank rows are marked, and existing period days
/// are left as they are. The fill stops at the first day that holds other
/// user data. Returns how many rows were written.
pub async fn auto_fill_following_days<S: LogStore>(
    store: &S,
    user_id: Uuid,
    day: NaiveDate,
    period_length: i32,
    flow: Flow,
    timezone: &Zone,
) -> Result<usize> {
    let mut written = 0;

    for offset in 1..i64::from(period_length) {
        let target = add_days(day, offset);

        let entry = match store.fetch_by_day(user_id, target).await? {
            Some(existing) if existing.is_period => continue,
            Some(existing) if existing.has_data() => {
                tracing::debug!(%user_id, %target, "user data on fill day, stopping");
                break;
            }
            Some(mut blank) => {
                blank.is_period = true;
                blank.flow = flow;
                blank
            }
            None => {
                let mut fresh = DailyLogEntry::new(user_id, target, timezone);
                fresh.is_period = true;
                fresh.flow = flow;
                fresh
            }
        };

        store.upsert(entry).await?;
        written += 1;
    }

    tracing::info!(%user_id, %day, written, "auto-filled period days");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn utc() -> Zone {
        Zone::utc()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn mark(store: &MemoryStore, user: Uuid, day: &str, is_period: bool, notes: &str) {
        let mut entry = DailyLogEntry::new(user, date(day), &utc());
        entry.is_period = is_period;
        entry.notes = notes.to_string();
        store.upsert(entry).await.unwrap();
    }

    async fn is_period(store: &MemoryStore, user: Uuid, day: &str) -> Option<bool> {
        store
            .fetch_by_day(user, date(day))
            .await
            .unwrap()
            .map(|e| e.is_period)
    }

    #[tokio::test]
    async fn fills_the_declared_period_length() {
        let store = MemoryStore::new(utc());
        let user = Uuid::new_v4();
        mark(&store, user, "2026-03-01", true, "").await;

        assert!(should_auto_fill(&store, user, date("2026-03-01"), false, true, 4).await.unwrap());
        let written = auto_fill_following_days(&store, user, date("2026-03-01"), 4, Flow::Medium, &utc())
            .await
            .unwrap();

        assert_eq!(written, 3);
        for day in ["2026-03-01", "2026-03-02", "2026-03-03", "2026-03-04"] {
            assert_eq!(is_period(&store, user, day).await, Some(true), "{day}");
        }
        assert_eq!(is_period(&store, user, "2026-03-05").await, None);
        let filled = store.fetch_by_day(user, date("2026-03-02")).await.unwrap().unwrap();
        assert_eq!(filled.flow, Flow::Medium);
    }

    #[tokio::test]
    async fn stops_at_user_entered_data() {
        let store = MemoryStore::new(utc());
        let user = Uuid::new_v4();
        mark(&store, user, "2026-03-01", true, "").await;
        mark(&store, user, "2026-03-03", false, "headache, no bleeding").await;

        let written = auto_fill_following_days(&store, user, date("2026-03-01"), 4, Flow::Light, &utc())
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(is_period(&store, user, "2026-03-02").await, Some(true));
        let kept = store.fetch_by_day(user, date("2026-03-03")).await.unwrap().unwrap();
        assert!(!kept.is_period);
        assert_eq!(kept.notes, "headache, no bleeding");
        assert_eq!(is_period(&store, user, "2026-03-04").await, None);
    }

    #[tokio::test]
    async fn existing_period_and_blank_rows_continue() {
        let store = MemoryStore::new(utc());
        let user = Uuid::new_v4();
        mark(&store, user, "2026-03-02", true, "").await;
        mark(&store, user, "2026-03-03", false, "").await;

        let written = auto_fill_following_days(&store, user, date("2026-03-01"), 4, Flow::Heavy, &utc())
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(is_period(&store, user, "2026-03-03").await, Some(true));
        assert_eq!(is_period(&store, user, "2026-03-04").await, Some(true));
        assert_eq!(store.all_entries(user).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn guards_block_refill() {
        let store = MemoryStore::new(utc());
        let user = Uuid::new_v4();
        mark(&store, user, "2026-02-27", true, "").await;

        // within three days of an earlier period day
        assert!(!should_auto_fill(&store, user, date("2026-03-02"), false, true, 5).await.unwrap());
        // four days later is a new run
        assert!(should_auto_fill(&store, user, date("2026-03-03"), false, true, 5).await.unwrap());
        // already a period before this write
        assert!(!should_auto_fill(&store, user, date("2026-03-03"), true, true, 5).await.unwrap());
        // disabled or nothing to extend
        assert!(!should_auto_fill(&store, user, date("2026-03-03"), false, false, 5).await.unwrap());
        assert!(!should_auto_fill(&store, user, date("2026-03-03"), false, true, 1).await.unwrap());
    }
}
