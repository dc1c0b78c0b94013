//! Autonomous scheduler
//!
//! Runs beside the feed on a wall-clock poll. Each poll launches the
//! timetable entries due in the current minute by claiming their target in
//! the shared ledger. Feed events are offered to [`AutonomousScheduler::on_event`]
//! which settles the scheduler's own pending predictions and refills the
//! timetable so the pipeline never drains.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::timetable::{draw_display_format, ScheduleStatus, Timetable};
use crate::config::SchedulerConfig;
use crate::domain::{
    minute_slot, FailureKind, GameNumber, MessageRef, Origin, Outcome, ScheduleState,
    TimetableSnapshot, PENDING_GLYPH,
};
use crate::feed::ParsedEvent;
use crate::ledger::Ledger;
use crate::strategy::render;
use crate::strategy::{OutcomeVerifier, Verification};

/// An entry that went live this poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Launch {
    pub target: GameNumber,
    pub id: String,
    pub display_format: String,
    /// Pending text for the caller to send
    pub text: String,
}

/// A scheduled prediction settled by a feed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledResolution {
    pub verification: Verification,
    /// Message bound at launch, if the caller reported one
    pub message: Option<MessageRef>,
    /// Target of the entry added to keep the pipeline full
    pub replacement: GameNumber,
}

#[derive(Debug)]
pub struct AutonomousScheduler {
    config: SchedulerConfig,
    timetable: Timetable,
    verifier: OutcomeVerifier,
    rng: StdRng,
    running: Arc<AtomicBool>,
}

impl AutonomousScheduler {
    /// Create a scheduler with a freshly generated timetable
    pub fn new(
        config: SchedulerConfig,
        verifier: OutcomeVerifier,
        now: NaiveDateTime,
        ledger: &Ledger,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let timetable = Timetable::generate(&config, now, &mut rng, ledger);
        info!(
            entries = timetable.len(),
            horizon = config.horizon,
            spacing_minutes = config.spacing_minutes,
            "autonomous scheduler ready"
        );

        Self {
            config,
            timetable,
            verifier,
            rng,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    /// Resume a persisted timetable if it belongs to the day of `now`.
    ///
    /// Launched entries are claimed again in `ledger` so the verification
    /// hook keeps settling them. Entries that can no longer run (target taken
    /// or launch slot already passed) are closed and replaced one for one.
    pub fn restore(
        &mut self,
        snapshot: TimetableSnapshot,
        ledger: &mut Ledger,
        now: NaiveDateTime,
    ) -> bool {
        let today = now.date();
        if snapshot.date != today {
            info!(
                stored = %snapshot.date,
                %today,
                "stored timetable is from another day, keeping the fresh one"
            );
            return false;
        }
        self.timetable = Timetable::from_snapshot(snapshot);

        let slot = minute_slot(now.time());
        let open: Vec<_> = self
            .timetable
            .entries()
            .filter(|e| e.state.is_open())
            .map(|e| (e.target, e.state, e.launch_time, e.message))
            .collect();

        let mut relaunched = 0;
        let mut replaced = 0;
        for (target, state, launch_time, message) in open {
            if state == ScheduleState::Launched {
                match ledger.try_claim(target, Origin::Scheduled, None) {
                    Ok(_) => {
                        if let Some(message) = message {
                            if let Err(e) = ledger.bind_message(target, message) {
                                warn!(target, error = %e, "could not rebind restored message");
                            }
                        }
                        relaunched += 1;
                    }
                    Err(conflict) => {
                        warn!(target, %conflict, "restored launch lost its target");
                        let glyph = Outcome::Failure(FailureKind::Expired).glyph(Origin::Scheduled);
                        self.close_entry(target, ScheduleState::Expired, Some(glyph));
                        self.add_replacement(now, ledger);
                        replaced += 1;
                    }
                }
                continue;
            }

            let missed = launch_time < slot;
            if let Err(conflict) = ledger.check_claim(target) {
                warn!(target, %conflict, "restored entry target already taken");
            } else if missed {
                debug!(target, %launch_time, "launch slot passed while stopped");
            } else {
                continue;
            }
            self.close_entry(target, ScheduleState::Skipped, None);
            self.add_replacement(now, ledger);
            replaced += 1;
        }

        info!(
            entries = self.timetable.len(),
            relaunched,
            replaced,
            "timetable restored"
        );
        true
    }

    /// Throw the timetable away and build a new one
    pub fn regenerate(&mut self, now: NaiveDateTime, ledger: &Ledger) {
        self.timetable = Timetable::generate(&self.config, now, &mut self.rng, ledger);
        info!(entries = self.timetable.len(), "timetable regenerated");
    }

    /// Launch every entry due in the minute of `now`
    pub fn launch_due(&mut self, ledger: &mut Ledger, now: NaiveDateTime) -> Vec<Launch> {
        let mut launches = Vec::new();

        for target in self.timetable.due(now.time()) {
            if let Err(conflict) = ledger.try_claim(target, Origin::Scheduled, None) {
                warn!(target, %conflict, "launch slot lost to an existing prediction");
                self.close_entry(target, ScheduleState::Skipped, None);
                self.add_replacement(now, ledger);
                continue;
            }

            let display_format = draw_display_format(&mut self.rng);
            let Some(entry) = self.timetable.get_mut(target) else {
                continue;
            };
            if let Err(e) = entry.transition(ScheduleState::Launched) {
                warn!(target, error = %e, "launch transition rejected");
                continue;
            }
            entry.display_format = Some(display_format.clone());

            info!(
                id = %entry.id,
                target,
                format = %display_format,
                lead = entry.launch_offset,
                "scheduled prediction launched"
            );
            launches.push(Launch {
                target,
                id: entry.id.clone(),
                display_format,
                text: render::pending_line(target),
            });
        }

        launches
    }

    /// Settle scheduled predictions the event resolves or leaves behind
    pub fn on_event(
        &mut self,
        ledger: &mut Ledger,
        event: &ParsedEvent,
        now: NaiveDateTime,
    ) -> Vec<ScheduledResolution> {
        let Some(first) = self.verifier.on_event(ledger, event, Origin::Scheduled) else {
            return Vec::new();
        };

        let mut verifications = vec![first];
        if let Some(game) = event.game {
            while let Some(v) = self.verifier.expire_next(ledger, game, Origin::Scheduled) {
                verifications.push(v);
            }
        }

        let mut resolutions = Vec::with_capacity(verifications.len());
        for verification in verifications {
            let state = if verification.succeeded() {
                ScheduleState::Verified
            } else {
                ScheduleState::Expired
            };
            self.close_entry(verification.target, state, Some(verification.entry().glyph()));

            let message = ledger.get(verification.target).and_then(|p| p.message);
            let replacement = self.add_replacement(now, ledger);
            resolutions.push(ScheduledResolution {
                verification,
                message,
                replacement,
            });
        }
        resolutions
    }

    /// Record the caller's message handle on a launched entry
    pub fn bind_message(&mut self, target: GameNumber, message: MessageRef) -> bool {
        match self.timetable.get_mut(target) {
            Some(entry) => {
                entry.message = Some(message);
                true
            }
            None => false,
        }
    }

    pub fn status(&self, now: NaiveDateTime) -> ScheduleStatus {
        self.timetable.status(now.time(), self.is_running())
    }

    pub fn snapshot(&self) -> TimetableSnapshot {
        self.timetable.snapshot()
    }

    /// Shared running flag, observed at the top of every poll cycle
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("autonomous scheduler stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn close_entry(&mut self, target: GameNumber, state: ScheduleState, glyph: Option<&str>) {
        let Some(entry) = self.timetable.get_mut(target) else {
            debug!(target, "resolved target has no timetable entry");
            return;
        };
        if let Err(e) = entry.transition(state) {
            warn!(target, error = %e, "schedule entry transition rejected");
            return;
        }
        entry.status = glyph.unwrap_or(PENDING_GLYPH).to_string();
    }

    fn add_replacement(&mut self, now: NaiveDateTime, ledger: &Ledger) -> GameNumber {
        let prediction_at = now + Duration::minutes(self.config.spacing_minutes);
        self.timetable
            .add_entry(&self.config, prediction_at, now, &mut self.rng, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Offset;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn scheduler(ledger: &Ledger) -> AutonomousScheduler {
        let config = SchedulerConfig {
            horizon: 3,
            lead_min_minutes: 2,
            lead_max_minutes: 2,
            seed: Some(11),
            ..Default::default()
        };
        // 10:00, 11:00, 12:00 launching at :58
        AutonomousScheduler::new(config, OutcomeVerifier::default(), at(9, 0, 0), ledger)
    }

    #[test]
    fn test_launch_claims_ledger() {
        let mut ledger = Ledger::new();
        let mut scheduler = scheduler(&ledger);

        assert!(scheduler.launch_due(&mut ledger, at(9, 57, 30)).is_empty());
        let launches = scheduler.launch_due(&mut ledger, at(9, 58, 5));
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].target, 1000);
        assert_eq!(launches[0].id, "N1000");
        assert_eq!(launches[0].text, "🎯Nº:1000 🔵Dis🔵tri🚥:statut :⌛");

        assert_eq!(ledger.get(1000).unwrap().origin, Origin::Scheduled);
        let entry = scheduler.timetable().get(1000).unwrap();
        assert!(entry.launched);
        assert!(entry.display_format.is_some());

        // A second poll in the same minute does not relaunch
        assert!(scheduler.launch_due(&mut ledger, at(9, 58, 35)).is_empty());
    }

    #[test]
    fn test_launch_conflict_skips_and_replaces() {
        let mut ledger = Ledger::new();
        let mut scheduler = scheduler(&ledger);
        ledger.try_claim(1000, Origin::Manual, Some("♠".into())).unwrap();

        let open_before = scheduler.timetable().open_count();
        assert!(scheduler.launch_due(&mut ledger, at(9, 58, 0)).is_empty());
        assert_eq!(
            scheduler.timetable().get(1000).unwrap().state,
            ScheduleState::Skipped
        );
        assert_eq!(scheduler.timetable().open_count(), open_before);
        assert_eq!(ledger.get(1000).unwrap().origin, Origin::Manual);
    }

    #[test]
    fn test_resolution_keeps_pipeline_size() {
        let mut ledger = Ledger::new();
        let mut scheduler = scheduler(&ledger);
        scheduler.launch_due(&mut ledger, at(9, 58, 0));
        let open_before = scheduler.timetable().open_count();

        let resolved = scheduler.on_event(
            &mut ledger,
            &ParsedEvent::parse("#N1001 ✅ (♠♥)(♦♣)"),
            at(10, 1, 0),
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].verification.outcome, Outcome::Success(Offset::One));
        assert_eq!(resolved[0].replacement, 1101);

        let entry = scheduler.timetable().get(1000).unwrap();
        assert_eq!(entry.state, ScheduleState::Verified);
        assert_eq!(entry.status, "✅1️⃣");
        assert_eq!(scheduler.timetable().open_count(), open_before);
    }

    #[test]
    fn test_expiry_marks_entry_expired() {
        let mut ledger = Ledger::new();
        let mut scheduler = scheduler(&ledger);
        scheduler.launch_due(&mut ledger, at(9, 58, 0));

        let resolved = scheduler.on_event(
            &mut ledger,
            &ParsedEvent::parse("#N1003 ❌ (♠)(♦♣)"),
            at(10, 3, 0),
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved[0].verification.outcome,
            Outcome::Failure(FailureKind::Expired)
        );
        let entry = scheduler.timetable().get(1000).unwrap();
        assert_eq!(entry.state, ScheduleState::Expired);
        assert_eq!(entry.status, "📌❌");
        assert!(entry.verified);
    }

    #[test]
    fn test_ignores_manual_predictions() {
        let mut ledger = Ledger::new();
        let mut scheduler = scheduler(&ledger);
        ledger.try_claim(1240, Origin::Manual, None).unwrap();

        let resolved = scheduler.on_event(
            &mut ledger,
            &ParsedEvent::parse("#N1240 ✅ (♠♥)(♦♣)"),
            at(10, 0, 0),
        );
        assert!(resolved.is_empty());
        assert!(ledger.pending_at(1240, None).is_some());
    }

    #[test]
    fn test_restore_only_same_day() {
        let mut ledger = Ledger::new();
        let mut scheduler = scheduler(&ledger);
        let snapshot = scheduler.snapshot();

        let mut other = snapshot.clone();
        other.date = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert!(!scheduler.restore(other, &mut ledger, at(9, 0, 0)));
        assert!(scheduler.restore(snapshot.clone(), &mut ledger, at(9, 0, 0)));
        assert_eq!(scheduler.snapshot(), snapshot);
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn test_restore_reclaims_launched_entries() {
        let mut ledger = Ledger::new();
        let mut first = scheduler(&ledger);
        first.launch_due(&mut ledger, at(9, 58, 0));
        let message = MessageRef {
            chat_id: -5,
            message_id: 12,
        };
        first.bind_message(1000, message);

        let mut fresh = Ledger::new();
        let mut second = scheduler(&fresh);
        assert!(second.restore(first.snapshot(), &mut fresh, at(9, 59, 0)));

        let prediction = fresh.pending_at(1000, Some(Origin::Scheduled)).unwrap();
        assert_eq!(prediction.message, Some(message));

        let resolved = second.on_event(
            &mut fresh,
            &ParsedEvent::parse("#N1000 ✅ (♠♥)(♦♣)"),
            at(10, 0, 0),
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].message, Some(message));
        assert_eq!(
            second.timetable().get(1000).unwrap().state,
            ScheduleState::Verified
        );
    }

    #[test]
    fn test_restore_replaces_unrunnable_entries() {
        let ledger = Ledger::new();
        let original = scheduler(&ledger);
        let snapshot = original.snapshot();
        let open_before = original.timetable().open_count();

        // 1000 missed its 9:58 slot; 1100 is already held by the feed
        let mut fresh = Ledger::new();
        fresh.try_claim(1100, Origin::Manual, None).unwrap();
        let mut restored = scheduler(&ledger);
        assert!(restored.restore(snapshot, &mut fresh, at(10, 5, 0)));

        let timetable = restored.timetable();
        assert_eq!(timetable.get(1000).unwrap().state, ScheduleState::Skipped);
        assert_eq!(timetable.get(1100).unwrap().state, ScheduleState::Skipped);
        assert_eq!(timetable.get(1200).unwrap().state, ScheduleState::Scheduled);
        assert_eq!(timetable.open_count(), open_before);
        assert_eq!(fresh.get(1100).unwrap().origin, Origin::Manual);
        assert!(fresh.get(1000).is_none());
    }

    #[test]
    fn test_running_flag() {
        let ledger = Ledger::new();
        let scheduler = scheduler(&ledger);
        let flag = scheduler.running_flag();
        assert!(!scheduler.is_running());
        scheduler.start();
        assert!(flag.load(Ordering::SeqCst));
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(!scheduler.status(at(9, 0, 0)).is_running);
    }
}
