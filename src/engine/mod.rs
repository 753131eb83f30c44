//! The cycle prediction and calendar state engine.
//!
//! Every function here is a pure computation over a log slice and a stats
//! snapshot, except [`autofill`], which reads and writes through a
//! [`crate::store::LogStore`].

pub mod autofill;
pub mod baseline;
pub mod calendar;
pub mod cycle_starts;
pub mod dates;
pub mod phase;
pub mod stats;

pub use autofill::{auto_fill_following_days, should_auto_fill};
pub use baseline::apply_baseline;
pub use calendar::{build_calendar_day_states, month_grid};
pub use cycle_starts::{authoritative_by_day, detect_cycle_starts, period_runs, PeriodRun};
pub use dates::{between_inclusive, day_boundaries, normalize_to_calendar_day, same_calendar_day, Zone};
pub use phase::detect_phase;
pub use stats::{compute_cycle_stats, cycle_lengths, estimate_ovulation};
