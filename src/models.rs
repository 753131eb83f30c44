use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::engine::dates::{self, Zone};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[default]
    None,
    Light,
    Medium,
    Heavy,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::None => "none",
            Flow::Light => "light",
            Flow::Medium => "medium",
            Flow::Heavy => "heavy",
        }
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Flow::None),
            "light" => Ok(Flow::Light),
            "medium" => Ok(Flow::Medium),
            "heavy" => Ok(Flow::Heavy),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored day observation.
///
/// The store may hold several rows for the same local day; see
/// [`DailyLogEntry::supersedes`] for which one wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLogEntry {
    /// Store-assigned, increasing. `0` until persisted.
    pub id: i64,
    pub user_id: Uuid,
    pub date: DateTime<Utc>,
    pub is_period: bool,
    pub flow: Flow,
    pub symptom_ids: BTreeSet<i32>,
    pub notes: String,
}

impl DailyLogEntry {
    /// A fresh, unsaved entry pinned to local midnight of `day`.
    pub fn new(user_id: Uuid, day: NaiveDate, timezone: &Zone) -> Self {
        let (start, _) = dates::day_boundaries(day, timezone);
        Self {
            id: 0,
            user_id,
            date: start,
            is_period: false,
            flow: Flow::None,
            symptom_ids: BTreeSet::new(),
            notes: String::new(),
        }
    }

    pub fn day(&self, timezone: &Zone) -> NaiveDate {
        dates::normalize_to_calendar_day(&self.date, timezone)
    }

    /// True when anything at all was recorded for the day.
    pub fn has_data(&self) -> bool {
        self.is_period
            || self.flow != Flow::None
            || !self.symptom_ids.is_empty()
            || !self.notes.trim().is_empty()
    }

    /// Whether `self` is authoritative over `other` for the same day: later
    /// timestamp wins, then higher id.
    pub fn supersedes(&self, other: &DailyLogEntry) -> bool {
        (self.date, self.id) > (other.date, other.id)
    }
}

/// Closed set of subject roles. Capabilities hang off the variant instead of
/// string comparisons at call sites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Owner,
    Partner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Partner => "partner",
        }
    }

    /// Only owners get onboarding defaults merged into their statistics.
    pub fn receives_baseline(&self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn sees_symptoms(&self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "partner" => Ok(Role::Partner),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCycleSettings {
    pub user_id: Uuid,
    pub role: Role,
    /// 15..=90
    pub cycle_length: i32,
    /// 1..=10
    pub period_length: i32,
    pub auto_period_fill: bool,
    pub last_period_start: Option<NaiveDate>,
}

impl UserCycleSettings {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Owner,
            cycle_length: 28,
            period_length: 5,
            auto_period_fill: false,
            last_period_start: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Menstrual,
    Follicular,
    Ovulation,
    Fertile,
    Luteal,
    #[default]
    Unknown,
}

/// Derived view over a user's logs. Rebuilt on every request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CycleStats {
    pub cycle_count: usize,
    pub average_cycle_length: f64,
    pub median_cycle_length: i32,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    pub average_period_length: f64,
    pub last_period_start: Option<NaiveDate>,
    pub next_period_start: Option<NaiveDate>,
    pub ovulation_date: Option<NaiveDate>,
    pub ovulation_exact: bool,
    pub ovulation_impossible: bool,
    pub fertility_window_start: Option<NaiveDate>,
    pub fertility_window_end: Option<NaiveDate>,
    /// 0 means unknown.
    pub current_cycle_day: i32,
    pub current_phase: Phase,
}

impl CycleStats {
    /// Whole-day cycle length used for projections, 0 when unknown.
    pub fn cycle_length(&self) -> i64 {
        if self.average_cycle_length > 0.0 {
            self.average_cycle_length.round() as i64
        } else {
            i64::from(self.median_cycle_length.max(0))
        }
    }

    /// Whole-day period length, defaulting to 5.
    pub fn period_length(&self) -> i64 {
        let rounded = self.average_period_length.round() as i64;
        if rounded > 0 {
            rounded
        } else {
            DEFAULT_PERIOD_LENGTH
        }
    }
}

pub const DEFAULT_PERIOD_LENGTH: i64 = 5;

/// The single tag a renderer paints on a calendar cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayBadge {
    Period,
    Predicted,
    Ovulation,
    Fertile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarDayState {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub is_period: bool,
    pub is_predicted: bool,
    pub is_fertility: bool,
    pub is_ovulation: bool,
    pub has_data: bool,
}

impl CalendarDayState {
    pub fn badge(&self) -> Option<DayBadge> {
        if self.is_period {
            Some(DayBadge::Period)
        } else if self.is_predicted {
            Some(DayBadge::Predicted)
        } else if self.is_ovulation {
            Some(DayBadge::Ovulation)
        } else if self.is_fertility {
            Some(DayBadge::Fertile)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub stats: CycleStats,
    pub days: Vec<CalendarDayState>,
}
