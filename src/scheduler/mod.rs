//! Autonomous prediction scheduler
//!
//! - `timetable` - day-scoped entries keyed by target
//! - `autonomous` - launch step, verification hook, running flag

pub mod autonomous;
pub mod timetable;

pub use autonomous::{AutonomousScheduler, Launch, ScheduledResolution};
pub use timetable::{draw_display_format, target_for, ScheduleStatus, Timetable, DISPLAY_FORMATS};
