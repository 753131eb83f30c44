use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::engine::cycle_starts::{authoritative_by_day, detect_cycle_starts};
use crate::engine::dates::Zone;
use crate::error::{Result, StoreError};
use crate::models::{DailyLogEntry, Role, UserCycleSettings};
use crate::store::{LogStore, SettingsStore};

#[derive(Default)]
struct Inner {
    entries: Vec<DailyLogEntry>,
    next_id: i64,
    settings: HashMap<Uuid, UserCycleSettings>,
}

/// In-process store with the same day semantics as [`super::PgStore`].
/// Duplicate rows for a day can be seeded with [`MemoryStore::insert_raw`].
pub struct MemoryStore {
    timezone: Zone,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(timezone: Zone) -> Self {
        Self {
            timezone,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Appends a row without any day matching, assigning an id if unset.
    pub fn insert_raw(&self, mut entry: DailyLogEntry) -> Result<DailyLogEntry> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        if entry.id == 0 {
            entry.id = inner.next_id;
        } else {
            inner.next_id = inner.next_id.max(entry.id);
        }
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn all_entries(&self, user_id: Uuid) -> Result<Vec<DailyLogEntry>> {
        Ok(self
            .lock()?
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl LogStore for MemoryStore {
    async fn fetch_range(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLogEntry>> {
        let tz = self.timezone;
        let mut entries: Vec<DailyLogEntry> = self
            .all_entries(user_id)?
            .into_iter()
            .filter(|e| {
                let day = e.day(&tz);
                from <= day && day <= to
            })
            .collect();
        entries.sort_by_key(|e| (e.date, e.id));
        Ok(entries)
    }

    async fn fetch_by_day(&self, user_id: Uuid, day: NaiveDate) -> Result<Option<DailyLogEntry>> {
        let entries = self.fetch_range(user_id, day, day).await?;
        Ok(authoritative_by_day(&entries, &self.timezone)
            .get(&day)
            .map(|entry| (*entry).clone()))
    }

    async fn upsert(&self, mut entry: DailyLogEntry) -> Result<DailyLogEntry> {
        let target_id = if entry.id != 0 {
            Some(entry.id)
        } else {
            let day = entry.day(&self.timezone);
            self.fetch_by_day(entry.user_id, day).await?.map(|e| e.id)
        };

        let mut inner = self.lock()?;
        if let Some(id) = target_id {
            if let Some(slot) = inner.entries.iter_mut().find(|e| e.id == id) {
                entry.id = id;
                entry.date = entry.date.max(slot.date);
                *slot = entry.clone();
                return Ok(entry);
            }
        }

        inner.next_id += 1;
        entry.id = inner.next_id;
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn delete_by_day(&self, user_id: Uuid, day: NaiveDate) -> Result<()> {
        let tz = self.timezone;
        self.lock()?
            .entries
            .retain(|e| !(e.user_id == user_id && e.day(&tz) == day));
        Ok(())
    }

    async fn refresh_last_period_start(&self, user_id: Uuid) -> Result<Option<NaiveDate>> {
        let entries = self.all_entries(user_id)?;
        let latest = detect_cycle_starts(&entries, &self.timezone).last().copied();

        let mut inner = self.lock()?;
        let settings = inner
            .settings
            .entry(user_id)
            .or_insert_with(|| UserCycleSettings::new(user_id));
        if latest.is_some() {
            settings.last_period_start = latest;
        }
        Ok(settings.last_period_start)
    }
}

impl SettingsStore for MemoryStore {
    async fn load_settings(&self, user_id: Uuid) -> Result<Option<UserCycleSettings>> {
        Ok(self.lock()?.settings.get(&user_id).cloned())
    }

    async fn save_settings(&self, settings: &UserCycleSettings) -> Result<()> {
        self.lock()?
            .settings
            .insert(settings.user_id, settings.clone());
        Ok(())
    }

    async fn owner_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .lock()?
            .settings
            .values()
            .filter(|s| s.role == Role::Owner)
            .map(|s| s.user_id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}
