//! Cycle statistics, predictions, phase classification and calendar
//! projection over a user's sparse day logs.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;
pub mod tracker;

pub use config::{AppConfig, EngineConfig};
pub use engine::Zone;
pub use error::{ConfigError, Result, StoreError};
pub use models::{
    CalendarDayState, CycleStats, DailyLogEntry, DayBadge, Flow, MonthView, Phase, Role,
    UserCycleSettings,
};
