//! Persistence collaborators.
//!
//! The engine only talks to these traits. [`PgStore`] backs them with
//! Postgres; [`MemoryStore`] keeps everything in process.

#![allow(async_fn_in_trait)]

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{DailyLogEntry, UserCycleSettings};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Day-log repository. Day arguments are local calendar days in the
/// store's configured timezone.
pub trait LogStore {
    /// Entries whose local day lies in `[from, to]`, duplicates included.
    async fn fetch_range(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLogEntry>>;

    /// The authoritative entry for `day`, if any.
    async fn fetch_by_day(&self, user_id: Uuid, day: NaiveDate) -> Result<Option<DailyLogEntry>>;

    async fn day_has_data(&self, user_id: Uuid, day: NaiveDate) -> Result<bool> {
        Ok(self
            .fetch_by_day(user_id, day)
            .await?
            .is_some_and(|entry| entry.has_data()))
    }

    /// Writes `entry` over the row with its id, or over the authoritative
    /// row of its local day, or as a new row. Returns what was stored.
    async fn upsert(&self, entry: DailyLogEntry) -> Result<DailyLogEntry>;

    /// Removes every row on `day`.
    async fn delete_by_day(&self, user_id: Uuid, day: NaiveDate) -> Result<()>;

    /// Recomputes the user's stored last period start from detected cycle
    /// starts. Leaves the declared value alone when no period is logged.
    async fn refresh_last_period_start(&self, user_id: Uuid) -> Result<Option<NaiveDate>>;
}

pub trait SettingsStore {
    async fn load_settings(&self, user_id: Uuid) -> Result<Option<UserCycleSettings>>;

    async fn save_settings(&self, settings: &UserCycleSettings) -> Result<()>;

    /// Users holding the owner role.
    async fn owner_ids(&self) -> Result<Vec<Uuid>>;
}
