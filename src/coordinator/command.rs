//! Desk commands and outbound intents

use serde::Serialize;
use tokio::sync::oneshot;

use super::state::DeskStatus;
use crate::domain::{GameNumber, MessageRef, TimetableSnapshot};
use crate::ledger::ResetScope;

/// Work the desk asks its host to perform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Intent {
    /// Send `text` to the display channel. When `bind_to` is set the
    /// returned handle is bound back to that prediction.
    Emit {
        bind_to: Option<GameNumber>,
        text: String,
    },
    /// Replace the text of an already sent prediction message
    Edit { message: MessageRef, text: String },
    /// Store the current timetable
    PersistSchedule(TimetableSnapshot),
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Emit { .. } => "emit",
            Intent::Edit { .. } => "edit",
            Intent::PersistSchedule(_) => "persist_schedule",
        }
    }
}

/// Control commands sent to the running desk
#[derive(Debug)]
pub enum DeskCommand {
    /// Clear pending state and regenerate the timetable
    Reset(ResetScope),
    /// Current statistics and schedule status
    Status(oneshot::Sender<DeskStatus>),
}
