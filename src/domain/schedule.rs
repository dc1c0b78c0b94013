use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::game::{GameNumber, MessageRef, PENDING_GLYPH};
use super::state::ScheduleState;
use crate::error::{Result, TableauError};

/// `HH:MM` wall-clock times in persisted records
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Truncate a time to its minute slot
pub fn minute_slot(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Metadata for one autonomous prediction, persisted alongside the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Display identifier, `N` + zero-padded target
    pub id: String,
    pub target: GameNumber,
    #[serde(with = "hhmm")]
    pub launch_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub prediction_time: NaiveTime,
    /// Minutes between launch and prediction time
    pub launch_offset: i64,
    pub state: ScheduleState,
    pub launched: bool,
    pub verified: bool,
    /// Resolved-outcome glyph (pending glyph until resolved)
    pub status: String,
    pub message: Option<MessageRef>,
    /// Display-format tag drawn at launch (e.g. `2K/2K`)
    pub display_format: Option<String>,
    pub generated_at: NaiveDateTime,
}

impl ScheduleEntry {
    pub fn new(
        target: GameNumber,
        prediction_time: NaiveTime,
        launch_offset: i64,
        generated_at: NaiveDateTime,
    ) -> Self {
        let launch_time = minute_slot(prediction_time - chrono::Duration::minutes(launch_offset));
        Self {
            id: format!("N{:04}", target),
            target,
            launch_time,
            prediction_time: minute_slot(prediction_time),
            launch_offset,
            state: ScheduleState::Scheduled,
            launched: false,
            verified: false,
            status: PENDING_GLYPH.to_string(),
            message: None,
            display_format: None,
            generated_at,
        }
    }

    /// Move to the next lifecycle state, keeping the persisted flags in step
    pub fn transition(&mut self, to: ScheduleState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(TableauError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.launched = matches!(
            to,
            ScheduleState::Launched | ScheduleState::Verified | ScheduleState::Expired
        );
        self.verified = matches!(to, ScheduleState::Verified | ScheduleState::Expired);
        Ok(())
    }

    pub fn is_due(&self, slot: NaiveTime) -> bool {
        self.state == ScheduleState::Scheduled && self.launch_time == minute_slot(slot)
    }
}

/// A day's timetable as stored by a `ScheduleStore`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableSnapshot {
    pub date: NaiveDate,
    pub entries: Vec<ScheduleEntry>,
}
