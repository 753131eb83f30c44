use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::engine::cycle_starts::detect_cycle_starts;
use crate::engine::dates::{day_boundaries, Zone};
use crate::error::{Result, StoreError};
use crate::models::{DailyLogEntry, Flow, Role, UserCycleSettings};
use crate::store::{LogStore, SettingsStore};

const LOG_COLUMNS: &str = "id, user_id, date, is_period, flow, symptom_ids, notes";

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    user_id: Uuid,
    date: DateTime<Utc>,
    is_period: bool,
    flow: String,
    symptom_ids: Vec<i32>,
    notes: String,
}

impl TryFrom<LogRow> for DailyLogEntry {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self> {
        let flow = row
            .flow
            .parse::<Flow>()
            .map_err(|value| StoreError::Decode { field: "flow", value })?;
        Ok(DailyLogEntry {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            is_period: row.is_period,
            flow,
            symptom_ids: row.symptom_ids.into_iter().collect(),
            notes: row.notes,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    user_id: Uuid,
    role: String,
    cycle_length: i32,
    period_length: i32,
    auto_period_fill: bool,
    last_period_start: Option<NaiveDate>,
}

impl TryFrom<SettingsRow> for UserCycleSettings {
    type Error = StoreError;

    fn try_from(row: SettingsRow) -> Result<Self> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|value| StoreError::Decode { field: "role", value })?;
        Ok(UserCycleSettings {
            user_id: row.user_id,
            role,
            cycle_length: row.cycle_length,
            period_length: row.period_length,
            auto_period_fill: row.auto_period_fill,
            last_period_start: row.last_period_start,
        })
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!("❌ DB error in {}: {:?}", context, e);
        StoreError::Sqlx(e)
    }
}

fn decode_rows(rows: Vec<LogRow>) -> Result<Vec<DailyLogEntry>> {
    rows.into_iter().map(DailyLogEntry::try_from).collect()
}

/// Postgres-backed log and settings store.
///
/// `daily_logs.date` is a `TIMESTAMPTZ`; local days are matched with
/// half-open absolute ranges from [`day_boundaries`], never by comparing
/// stored dates.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    timezone: Zone,
}

impl PgStore {
    pub fn new(pool: PgPool, timezone: Zone) -> Self {
        Self { pool, timezone }
    }

    pub async fn connect(database_url: &str, max_connections: u32, timezone: Zone) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;

        tracing::info!("🗄️ Connected to database (pool size: {})", max_connections);
        Ok(Self::new(pool, timezone))
    }

    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    fn range(&self, from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let (start, _) = day_boundaries(from, &self.timezone);
        let (_, end) = day_boundaries(to, &self.timezone);
        (start, end)
    }
}

impl LogStore for PgStore {
    async fn fetch_range(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLogEntry>> {
        let (start, end) = self.range(from, to);
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM daily_logs
             WHERE user_id = $1 AND date >= $2 AND date < $3
             ORDER BY date ASC, id ASC"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch_range"))?;

        decode_rows(rows)
    }

    async fn fetch_by_day(&self, user_id: Uuid, day: NaiveDate) -> Result<Option<DailyLogEntry>> {
        let (start, end) = day_boundaries(day, &self.timezone);
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM daily_logs
             WHERE user_id = $1 AND date >= $2 AND date < $3
             ORDER BY date DESC, id DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch_by_day"))?;

        row.map(DailyLogEntry::try_from).transpose()
    }

    async fn upsert(&self, entry: DailyLogEntry) -> Result<DailyLogEntry> {
        let mut tx = self.pool.begin().await.map_err(db_error("upsert"))?;

        let target_id = if entry.id != 0 {
            Some(entry.id)
        } else {
            let (start, end) = day_boundaries(entry.day(&self.timezone), &self.timezone);
            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM daily_logs
                 WHERE user_id = $1 AND date >= $2 AND date < $3
                 ORDER BY date DESC, id DESC
                 LIMIT 1
                 FOR UPDATE",
            )
            .bind(entry.user_id)
            .bind(start)
            .bind(end)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("upsert"))?
        };

        let symptom_ids: Vec<i32> = entry.symptom_ids.iter().copied().collect();

        // the rewritten row keeps its place ahead of any older duplicate
        let updated = match target_id {
            Some(id) => sqlx::query_as::<_, LogRow>(&format!(
                "UPDATE daily_logs
                 SET date = GREATEST(date, $3), is_period = $4, flow = $5, symptom_ids = $6, notes = $7
                 WHERE id = $1 AND user_id = $2
                 RETURNING {LOG_COLUMNS}"
            ))
            .bind(id)
            .bind(entry.user_id)
            .bind(entry.date)
            .bind(entry.is_period)
            .bind(entry.flow.as_str())
            .bind(&symptom_ids)
            .bind(&entry.notes)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("upsert"))?,
            None => None,
        };

        let row = match updated {
            Some(row) => row,
            None => sqlx::query_as::<_, LogRow>(&format!(
                "INSERT INTO daily_logs (user_id, date, is_period, flow, symptom_ids, notes)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {LOG_COLUMNS}"
            ))
            .bind(entry.user_id)
            .bind(entry.date)
            .bind(entry.is_period)
            .bind(entry.flow.as_str())
            .bind(&symptom_ids)
            .bind(&entry.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("upsert"))?,
        };

        tx.commit().await.map_err(db_error("upsert"))?;
        DailyLogEntry::try_from(row)
    }

    async fn delete_by_day(&self, user_id: Uuid, day: NaiveDate) -> Result<()> {
        let (start, end) = day_boundaries(day, &self.timezone);
        sqlx::query("DELETE FROM daily_logs WHERE user_id = $1 AND date >= $2 AND date < $3")
            .bind(user_id)
            .bind(start)
            .bind(end)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_by_day"))?;
        Ok(())
    }

    async fn refresh_last_period_start(&self, user_id: Uuid) -> Result<Option<NaiveDate>> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM daily_logs WHERE user_id = $1 ORDER BY date ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("refresh_last_period_start"))?;
        let entries = decode_rows(rows)?;

        let Some(latest) = detect_cycle_starts(&entries, &self.timezone).last().copied() else {
            return Ok(self
                .load_settings(user_id)
                .await?
                .and_then(|s| s.last_period_start));
        };

        sqlx::query("UPDATE user_cycle_settings SET last_period_start = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(latest)
            .execute(&self.pool)
            .await
            .map_err(db_error("refresh_last_period_start"))?;

        tracing::info!(%user_id, %latest, "refreshed last period start");
        Ok(Some(latest))
    }
}

impl SettingsStore for PgStore {
    async fn load_settings(&self, user_id: Uuid) -> Result<Option<UserCycleSettings>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT user_id, role, cycle_length, period_length, auto_period_fill, last_period_start
             FROM user_cycle_settings
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("load_settings"))?;

        row.map(UserCycleSettings::try_from).transpose()
    }

    async fn save_settings(&self, settings: &UserCycleSettings) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_cycle_settings
                (user_id, role, cycle_length, period_length, auto_period_fill, last_period_start)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO UPDATE SET
                role = excluded.role,
                cycle_length = excluded.cycle_length,
                period_length = excluded.period_length,
                auto_period_fill = excluded.auto_period_fill,
                last_period_start = excluded.last_period_start",
        )
        .bind(settings.user_id)
        .bind(settings.role.as_str())
        .bind(settings.cycle_length)
        .bind(settings.period_length)
        .bind(settings.auto_period_fill)
        .bind(settings.last_period_start)
        .execute(&self.pool)
        .await
        .map_err(db_error("save_settings"))?;
        Ok(())
    }

    async fn owner_ids(&self) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM user_cycle_settings WHERE role = 'owner' ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("owner_ids"))
    }
}
