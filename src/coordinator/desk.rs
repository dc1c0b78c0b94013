//! Desk: single owner of the ledger and every component that touches it
//!
//! The event path runs trigger detection, then verification of feed-opened
//! predictions, then the scheduler's own verification hook, all against the
//! same parsed event. Every step returns intents; the desk never performs
//! I/O itself.

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::command::Intent;
use super::state::DeskStatus;
use crate::config::AppConfig;
use crate::domain::{GameNumber, MessageRef, Origin, TimetableSnapshot, PENDING_GLYPH};
use crate::error::{Result, TableauError};
use crate::feed::{MessageLog, ParsedEvent};
use crate::ledger::{Ledger, ResetScope};
use crate::scheduler::AutonomousScheduler;
use crate::strategy::{
    render, OutcomeVerifier, ReportAggregator, TriggerDetector, TriggerDetectorConfig,
    Verification, VerifierConfig,
};

/// Number of predictions listed in status output
const RECENT_LIMIT: usize = 10;

#[derive(Debug)]
pub struct Desk {
    ledger: Ledger,
    trigger: TriggerDetector,
    verifier: OutcomeVerifier,
    reports: ReportAggregator,
    scheduler: Option<AutonomousScheduler>,
    message_log: Option<MessageLog>,
    stat_channel: Option<i64>,
}

impl Desk {
    pub fn new(config: &AppConfig, now: NaiveDateTime) -> Self {
        let ledger = Ledger::new();
        let verifier = OutcomeVerifier::new(VerifierConfig::from(&config.engine));

        let scheduler = config.scheduler.enabled.then(|| {
            AutonomousScheduler::new(config.scheduler.clone(), verifier.clone(), now, &ledger)
        });
        let message_log = config
            .feed
            .dedupe_messages
            .then(|| MessageLog::new(config.feed.dedupe_capacity));

        Self {
            trigger: TriggerDetector::new(
                TriggerDetectorConfig::from(&config.engine),
                config.engine.seed,
            ),
            verifier,
            reports: ReportAggregator::new(config.report.batch_size),
            scheduler,
            message_log,
            stat_channel: config.channels.stat_channel,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn scheduler(&self) -> Option<&AutonomousScheduler> {
        self.scheduler.as_ref()
    }

    /// Entry point for raw feed messages; drops exact redeliveries when enabled
    /// and anything outside the stat channel when one is configured
    pub fn on_message(&mut self, channel: i64, text: &str, now: NaiveDateTime) -> Vec<Intent> {
        if self.stat_channel.is_some_and(|stat| stat != channel) {
            debug!(channel, "message from outside the stat channel ignored");
            return Vec::new();
        }
        if let Some(log) = self.message_log.as_mut() {
            if !log.check_and_mark(channel, text) {
                debug!(channel, "duplicate message dropped");
                return Vec::new();
            }
        }
        self.on_event(text, now)
    }

    /// Process one feed event in full
    pub fn on_event(&mut self, text: &str, now: NaiveDateTime) -> Vec<Intent> {
        let event = ParsedEvent::parse(text);
        let mut intents = Vec::new();

        if let Some(signal) = self.trigger.on_event(&mut self.ledger, &event) {
            intents.push(Intent::Emit {
                bind_to: Some(signal.target),
                text: render::pending_line(signal.target),
            });
        }

        if let Some(first) = self.verifier.on_event(&mut self.ledger, &event, Origin::Manual) {
            self.push_resolution(&first, &mut intents);
            if let Some(game) = event.game {
                while let Some(v) = self.verifier.expire_next(&mut self.ledger, game, Origin::Manual)
                {
                    self.push_resolution(&v, &mut intents);
                }
            }
        }

        if let Some(scheduler) = self.scheduler.as_mut() {
            let resolved = scheduler.on_event(&mut self.ledger, &event, now);
            if !resolved.is_empty() {
                for r in &resolved {
                    self.push_resolution(&r.verification, &mut intents);
                }
                intents.extend(self.persist_intent());
            }
        }

        if !intents.is_empty() {
            debug!(game = ?event.game, intents = intents.len(), "event produced intents");
        }
        intents
    }

    /// One scheduler poll cycle
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<Intent> {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Vec::new();
        };
        let len_before = scheduler.timetable().len();
        let launches = scheduler.launch_due(&mut self.ledger, now);
        // Skipped launches add replacement entries
        let changed = !launches.is_empty() || scheduler.timetable().len() != len_before;

        let mut intents: Vec<Intent> = launches
            .into_iter()
            .map(|launch| Intent::Emit {
                bind_to: Some(launch.target),
                text: launch.text,
            })
            .collect();

        if changed {
            intents.extend(self.persist_intent());
        }
        intents
    }

    /// Attach the handle the host got back from sending a prediction.
    ///
    /// When the prediction was resolved while the send was in flight, the
    /// returned edit brings that message up to the outcome.
    pub fn bind_message(&mut self, target: GameNumber, message: MessageRef) -> Result<Option<Intent>> {
        let late = match self.ledger.bind_message(target, message) {
            Ok(()) => None,
            Err(TableauError::AlreadyResolved(_)) => {
                let glyph = self.ledger.get(target).map_or(PENDING_GLYPH, |p| p.glyph());
                info!(target, glyph, "message bound after resolution, editing it");
                Some(Intent::Edit {
                    message,
                    text: render::prediction_line(target, glyph),
                })
            }
            Err(e) => return Err(e),
        };
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.bind_message(target, message);
        }
        Ok(late)
    }

    /// Clear pending predictions and dedupe memory, then regenerate the timetable
    pub fn reset(&mut self, scope: ResetScope, now: NaiveDateTime) -> Vec<Intent> {
        self.ledger.reset(scope);
        if scope == ResetScope::Full {
            self.reports.reset();
        }
        if let Some(log) = self.message_log.as_mut() {
            log.clear();
        }

        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.regenerate(now, &self.ledger);
        }
        info!(?scope, "desk reset");
        self.persist_intent().into_iter().collect()
    }

    /// Resume a stored timetable; only a timetable from the day of `now` is accepted
    pub fn restore_schedule(&mut self, snapshot: TimetableSnapshot, now: NaiveDateTime) -> bool {
        match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.restore(snapshot, &mut self.ledger, now),
            None => false,
        }
    }

    /// Current timetable, for an initial save
    pub fn schedule_snapshot(&self) -> Option<TimetableSnapshot> {
        self.scheduler.as_ref().map(AutonomousScheduler::snapshot)
    }

    pub fn status(&self, now: NaiveDateTime) -> DeskStatus {
        DeskStatus {
            at: now,
            stats: self.ledger.statistics(),
            recent: self.ledger.recent(RECENT_LIMIT),
            schedule: self.scheduler.as_ref().map(|s| s.status(now)),
        }
    }

    fn push_resolution(&mut self, verification: &Verification, intents: &mut Vec<Intent>) {
        let text = render::prediction_line(verification.target, verification.entry().glyph());
        let message = self
            .ledger
            .get(verification.target)
            .and_then(|p| p.message);

        intents.push(match message {
            Some(message) => Intent::Edit { message, text },
            None => {
                debug!(
                    target = verification.target,
                    "resolved prediction has no bound message, sending fresh"
                );
                Intent::Emit {
                    bind_to: None,
                    text,
                }
            }
        });

        while let Some(report) = self.reports.maybe_report(self.ledger.history()) {
            intents.push(Intent::Emit {
                bind_to: None,
                text: render::batch_report(&report),
            });
        }
    }

    fn persist_intent(&self) -> Option<Intent> {
        self.schedule_snapshot().map(Intent::PersistSchedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn config(scheduler: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.engine.trigger_digits = vec![4];
        config.engine.variability_skip_probability = 0.0;
        config.engine.seed = Some(1);
        config.scheduler.enabled = scheduler;
        config.scheduler.lead_min_minutes = 2;
        config.scheduler.lead_max_minutes = 2;
        config.scheduler.seed = Some(1);
        config
    }

    fn texts(intents: &[Intent]) -> Vec<&str> {
        intents
            .iter()
            .filter_map(|i| match i {
                Intent::Emit { text, .. } | Intent::Edit { text, .. } => Some(text.as_str()),
                Intent::PersistSchedule(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_trigger_then_offset_one_success() {
        let mut desk = Desk::new(&config(false), at(10, 0));

        let intents = desk.on_event("#N1234. (♠♥) - (♦)", at(10, 1));
        assert_eq!(
            intents,
            vec![Intent::Emit {
                bind_to: Some(1240),
                text: render::pending_line(1240),
            }]
        );

        let message = MessageRef {
            chat_id: -100,
            message_id: 7,
        };
        assert_eq!(desk.bind_message(1240, message).unwrap(), None);

        let intents = desk.on_event("#N1241 ✅ (♠♥)(♦♣)", at(10, 5));
        assert_eq!(
            intents,
            vec![Intent::Edit {
                message,
                text: "🎯Nº:1240 🔵Dis🔵tri🚥:statut :✅1️⃣".to_string(),
            }]
        );

        // Nothing left to expire
        assert!(desk.on_event("#N1243 ⏰ (♠)(♦)", at(10, 6)).is_empty());
        assert_eq!(desk.ledger().statistics().wins, 1);
    }

    #[test]
    fn test_unbound_resolution_sends_fresh_message() {
        let mut desk = Desk::new(&config(false), at(10, 0));
        desk.on_event("#N1234. (♠♥)", at(10, 1));

        let intents = desk.on_event("#N1245 ✅ (♠♥)(♦♣)", at(10, 9));
        assert_eq!(
            intents,
            vec![Intent::Emit {
                bind_to: None,
                text: render::prediction_line(1240, "❌❌"),
            }]
        );
    }

    #[test]
    fn test_late_bind_edits_to_outcome() {
        let mut desk = Desk::new(&config(false), at(10, 0));
        desk.on_event("#N1234. (♠♥)", at(10, 1));
        // Resolved while the pending message was still being sent
        let intents = desk.on_event("#N1241 ✅ (♠♥)(♦♣)", at(10, 2));
        assert!(matches!(intents.as_slice(), [Intent::Emit { bind_to: None, .. }]));

        let message = MessageRef {
            chat_id: -100,
            message_id: 3,
        };
        assert_eq!(
            desk.bind_message(1240, message).unwrap(),
            Some(Intent::Edit {
                message,
                text: render::prediction_line(1240, "✅1️⃣"),
            })
        );
        assert_eq!(desk.ledger().get(1240).unwrap().message, None);
        assert!(desk.bind_message(9999, message).is_err());
    }

    #[test]
    fn test_batch_report_follows_resolution() {
        let mut config = config(false);
        config.report.batch_size = 2;
        let mut desk = Desk::new(&config, at(10, 0));

        desk.on_event("#N1234. (♠♥)", at(10, 1));
        desk.on_event("#N1244. (♦♣)", at(10, 2));
        let first = desk.on_event("#N1240 ✅ (♠♥)(♦♣)", at(10, 3));
        assert_eq!(first.len(), 1);

        let second = desk.on_event("#N1250 ✅ (♠♥)(♦♣)", at(10, 4));
        let lines = texts(&second);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("📊 Bilan des 2 dernières prédictions :"));
        assert!(lines[1].ends_with("📈 Statistiques: 2/2 (100.0% de réussite)"));
    }

    #[test]
    fn test_duplicate_message_dropped() {
        let mut config = config(false);
        config.feed.dedupe_messages = true;
        let mut desk = Desk::new(&config, at(10, 0));

        assert_eq!(desk.on_message(1, "#N1234. (♠♥)", at(10, 1)).len(), 1);
        assert!(desk.on_message(1, "#N1234. (♠♥)", at(10, 1)).is_empty());
    }

    #[test]
    fn test_only_stat_channel_is_read() {
        let mut config = config(false);
        config.channels.stat_channel = Some(-100);
        let mut desk = Desk::new(&config, at(10, 0));

        assert!(desk.on_message(-200, "#N1234. (♠♥)", at(10, 1)).is_empty());
        assert!(desk.ledger().get(1240).is_none());
        assert_eq!(desk.on_message(-100, "#N1234. (♠♥)", at(10, 1)).len(), 1);
    }

    #[test]
    fn test_scheduled_launch_and_resolution() {
        let mut desk = Desk::new(&config(true), at(10, 0));
        assert!(desk.tick(at(10, 0)).is_empty());

        let intents = desk.tick(at(10, 58));
        assert!(matches!(
            intents[0],
            Intent::Emit {
                bind_to: Some(1100),
                ..
            }
        ));
        assert!(matches!(intents.last(), Some(Intent::PersistSchedule(_))));
        assert_eq!(desk.ledger().get(1100).unwrap().origin, Origin::Scheduled);

        let intents = desk.on_event("#N1100 ✅ (♠♥)(♦♣)", at(11, 0));
        assert_eq!(texts(&intents), vec!["🎯Nº:1100 🔵Dis🔵tri🚥:statut :✅0️⃣"]);
        assert!(matches!(intents.last(), Some(Intent::PersistSchedule(_))));
    }

    #[test]
    fn test_reset_clears_pending_and_persists() {
        let mut desk = Desk::new(&config(true), at(10, 0));
        desk.on_event("#N1234. (♠♥)", at(10, 1));
        assert_eq!(desk.ledger().pending_count(), 1);

        let intents = desk.reset(ResetScope::KeepHistory, at(10, 2));
        assert!(matches!(intents.as_slice(), [Intent::PersistSchedule(_)]));
        assert_eq!(desk.ledger().pending_count(), 0);

        let status = desk.status(at(10, 2));
        assert_eq!(status.schedule.map(|s| s.total), Some(12));
    }

    #[test]
    fn test_reset_without_scheduler_has_no_intents() {
        let mut desk = Desk::new(&config(false), at(10, 0));
        assert!(desk.reset(ResetScope::Full, at(10, 1)).is_empty());
        assert!(desk.status(at(10, 1)).schedule.is_none());
    }
}
