//! Desk state snapshot for status queries

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::ledger::{LedgerStats, RecentPrediction};
use crate::scheduler::ScheduleStatus;

/// Point-in-time view of the desk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskStatus {
    pub at: NaiveDateTime,
    pub stats: LedgerStats,
    pub recent: Vec<RecentPrediction>,
    /// `None` when the scheduler is disabled
    pub schedule: Option<ScheduleStatus>,
}
