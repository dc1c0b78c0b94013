//! Autonomous timetable
//!
//! Entries are keyed by target. A target is derived from the prediction time
//! (`15:37` → `1537`); collisions move to the next free number.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::domain::{minute_slot, GameNumber, ScheduleEntry, ScheduleState, TimetableSnapshot};
use crate::ledger::Ledger;

/// Display-format tags drawn for launched entries
pub const DISPLAY_FORMATS: [&str; 4] = ["2K/2K", "2P/2P", "2C/2C", "2T/2T"];

/// Target derived from a prediction time
pub fn target_for(time: NaiveTime) -> GameNumber {
    GameNumber::from(time.hour() * 100 + time.minute())
}

pub fn draw_display_format<R: Rng>(rng: &mut R) -> String {
    DISPLAY_FORMATS
        .choose(rng)
        .copied()
        .unwrap_or(DISPLAY_FORMATS[0])
        .to_string()
}

/// Counters shown by the status command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub date: NaiveDate,
    pub total: usize,
    pub launched: usize,
    pub verified: usize,
    /// Entries not launched yet
    pub pending: usize,
    /// Id and launch time of the next entry after the current slot
    pub next_launch: Option<(String, NaiveTime)>,
    pub is_running: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timetable {
    date: NaiveDate,
    entries: BTreeMap<GameNumber, ScheduleEntry>,
}

impl Timetable {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            entries: BTreeMap::new(),
        }
    }

    /// Fresh timetable of `horizon` entries spaced after `now`
    pub fn generate<R: Rng>(
        config: &SchedulerConfig,
        now: NaiveDateTime,
        rng: &mut R,
        ledger: &Ledger,
    ) -> Self {
        let mut timetable = Self::empty(now.date());
        for i in 1..=config.horizon as i64 {
            let prediction_at = now + Duration::minutes(config.spacing_minutes * i);
            timetable.add_entry(config, prediction_at, now, rng, ledger);
        }
        debug!(
            entries = timetable.len(),
            date = %timetable.date,
            "timetable generated"
        );
        timetable
    }

    /// Add one entry predicting at `prediction_at`, returning its target
    pub fn add_entry<R: Rng>(
        &mut self,
        config: &SchedulerConfig,
        prediction_at: NaiveDateTime,
        generated_at: NaiveDateTime,
        rng: &mut R,
        ledger: &Ledger,
    ) -> GameNumber {
        let lead_min = config.lead_min_minutes.min(config.lead_max_minutes);
        let lead = rng.gen_range(lead_min..=config.lead_max_minutes);

        let mut target = target_for(prediction_at.time());
        while self.entries.contains_key(&target) || ledger.check_claim(target).is_err() {
            target += 1;
        }

        let entry = ScheduleEntry::new(target, prediction_at.time(), lead, generated_at);
        debug!(
            id = %entry.id,
            launch = %entry.launch_time.format("%H:%M"),
            prediction = %entry.prediction_time.format("%H:%M"),
            lead,
            "timetable entry added"
        );
        self.entries.insert(target, entry);
        target
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, target: GameNumber) -> Option<&ScheduleEntry> {
        self.entries.get(&target)
    }

    pub fn get_mut(&mut self, target: GameNumber) -> Option<&mut ScheduleEntry> {
        self.entries.get_mut(&target)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.values()
    }

    /// Targets whose launch time falls in the minute of `now`
    pub fn due(&self, now: NaiveTime) -> Vec<GameNumber> {
        self.entries
            .values()
            .filter(|e| e.is_due(now))
            .map(|e| e.target)
            .collect()
    }

    /// Entries still waiting to launch or to resolve
    pub fn open_count(&self) -> usize {
        self.entries.values().filter(|e| e.state.is_open()).count()
    }

    pub fn status(&self, now: NaiveTime, is_running: bool) -> ScheduleStatus {
        let slot = minute_slot(now);
        let total = self.entries.len();
        let launched = self.entries.values().filter(|e| e.launched).count();
        let verified = self.entries.values().filter(|e| e.verified).count();

        let next_launch = self
            .entries
            .values()
            .filter(|e| e.state == ScheduleState::Scheduled && e.launch_time > slot)
            .min_by_key(|e| e.launch_time)
            .map(|e| (e.id.clone(), e.launch_time));

        ScheduleStatus {
            date: self.date,
            total,
            launched,
            verified,
            pending: total - launched,
            next_launch,
            is_running,
        }
    }

    pub fn snapshot(&self) -> TimetableSnapshot {
        TimetableSnapshot {
            date: self.date,
            entries: self.entries.values().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: TimetableSnapshot) -> Self {
        Self {
            date: snapshot.date,
            entries: snapshot
                .entries
                .into_iter()
                .map(|e| (e.target, e))
                .collect(),
        }
    }
}
