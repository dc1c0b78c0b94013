//! Prediction ledger
//!
//! Single source of truth mapping game number → prediction, plus the
//! append-only resolution history. Both the trigger detector and the
//! scheduler insert through [`Ledger::try_claim`], which is the only place
//! the one-prediction-per-game invariant is enforced.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{
    GameNumber, MessageRef, Origin, Prediction, PredictionStatus, Resolution, ResolvedEntry,
};
use crate::error::{Result, TableauError};

/// Why the ledger refused a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimConflict {
    #[error("#{target} already has a {origin} prediction")]
    Occupied { target: GameNumber, origin: Origin },

    #[error("#{target} is reserved by the scheduler")]
    Reserved { target: GameNumber },

    #[error("#{target} was already resolved")]
    Resolved { target: GameNumber },
}

/// What a reset clears besides pending state and dedupe markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Keep the resolution history (and its targets stay unclaimable)
    KeepHistory,
    /// Clear everything
    Full,
}

/// Aggregate counters over the ledger
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    pub win_rate: f64,
}

/// A prediction as shown in "recent predictions" listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPrediction {
    pub target: GameNumber,
    pub origin: Origin,
    pub suits: Option<String>,
    pub status: String,
}

#[derive(Debug, Default)]
pub struct Ledger {
    predictions: BTreeMap<GameNumber, Prediction>,
    /// Targets in claim order
    claim_order: Vec<GameNumber>,
    history: Vec<ResolvedEntry>,
    resolved_targets: HashSet<GameNumber>,
    /// Targets the scheduler has claimed
    scheduler_marks: HashSet<GameNumber>,
    /// Source game numbers that already produced a trigger
    processed_games: HashSet<GameNumber>,
    last_trigger_digit: Option<u8>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `target` could be claimed right now
    pub fn check_claim(&self, target: GameNumber) -> std::result::Result<(), ClaimConflict> {
        if let Some(existing) = self.predictions.get(&target) {
            return Err(ClaimConflict::Occupied {
                target,
                origin: existing.origin,
            });
        }
        if self.scheduler_marks.contains(&target) {
            return Err(ClaimConflict::Reserved { target });
        }
        if self.resolved_targets.contains(&target) {
            return Err(ClaimConflict::Resolved { target });
        }
        Ok(())
    }

    /// Insert a pending prediction if no prediction of any origin holds `target`
    pub fn try_claim(
        &mut self,
        target: GameNumber,
        origin: Origin,
        suits: Option<String>,
    ) -> std::result::Result<&Prediction, ClaimConflict> {
        if let Err(conflict) = self.check_claim(target) {
            debug!(target, %origin, %conflict, "claim rejected");
            return Err(conflict);
        }

        if origin == Origin::Scheduled {
            self.scheduler_marks.insert(target);
        }
        self.claim_order.push(target);
        info!(target, %origin, suits = ?suits, "prediction claimed");

        Ok(&*self
            .predictions
            .entry(target)
            .or_insert_with(|| Prediction::new(target, origin, suits)))
    }

    /// Transition a pending prediction to resolved and append it to history
    pub fn resolve(&mut self, target: GameNumber, resolution: Resolution) -> Result<ResolvedEntry> {
        let prediction = self
            .predictions
            .get_mut(&target)
            .ok_or(TableauError::PredictionNotFound(target))?;

        if !prediction.is_pending() {
            return Err(TableauError::AlreadyResolved(target));
        }

        prediction.status = PredictionStatus::Resolved(resolution);
        let entry = ResolvedEntry {
            target,
            origin: prediction.origin,
            outcome: resolution.outcome,
        };
        self.history.push(entry);
        self.resolved_targets.insert(target);

        info!(
            target,
            origin = %entry.origin,
            resolved_by = resolution.resolved_by,
            status = entry.glyph(),
            history_len = self.history.len(),
            "prediction resolved"
        );
        Ok(entry)
    }

    /// Attach the caller's message handle to a pending prediction.
    ///
    /// Resolved records are never changed; a late handle gets `AlreadyResolved`.
    pub fn bind_message(&mut self, target: GameNumber, message: MessageRef) -> Result<()> {
        let prediction = self
            .predictions
            .get_mut(&target)
            .ok_or(TableauError::PredictionNotFound(target))?;
        if !prediction.is_pending() {
            return Err(TableauError::AlreadyResolved(target));
        }
        prediction.message = Some(message);
        Ok(())
    }

    pub fn get(&self, target: GameNumber) -> Option<&Prediction> {
        self.predictions.get(&target)
    }

    /// Pending prediction at `target`, optionally restricted to one origin
    pub fn pending_at(&self, target: GameNumber, scope: Option<Origin>) -> Option<&Prediction> {
        self.predictions
            .get(&target)
            .filter(|p| p.is_pending() && scope.map_or(true, |o| p.origin == o))
    }

    /// Pending targets in ascending order, optionally restricted to one origin
    pub fn pending_targets(&self, scope: Option<Origin>) -> Vec<GameNumber> {
        self.predictions
            .values()
            .filter(|p| p.is_pending() && scope.map_or(true, |o| p.origin == o))
            .map(|p| p.target)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.predictions.values().filter(|p| p.is_pending()).count()
    }

    pub fn history(&self) -> &[ResolvedEntry] {
        &self.history
    }

    pub fn is_processed(&self, game: GameNumber) -> bool {
        self.processed_games.contains(&game)
    }

    pub fn mark_processed(&mut self, game: GameNumber) {
        self.processed_games.insert(game);
    }

    pub fn last_trigger_digit(&self) -> Option<u8> {
        self.last_trigger_digit
    }

    pub fn set_last_trigger_digit(&mut self, digit: u8) {
        self.last_trigger_digit = Some(digit);
    }

    /// Counters over resolved history and current pending predictions
    pub fn statistics(&self) -> LedgerStats {
        let total = self.history.len();
        let wins = self.history.iter().filter(|e| e.outcome.is_success()).count();
        let losses = total - wins;
        let win_rate = if total > 0 {
            wins as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        LedgerStats {
            total,
            wins,
            losses,
            pending: self.pending_count(),
            win_rate,
        }
    }

    /// Most recently claimed predictions with their current status glyph
    pub fn recent(&self, count: usize) -> Vec<RecentPrediction> {
        let skip = self.claim_order.len().saturating_sub(count);
        self.claim_order
            .iter()
            .skip(skip)
            .filter_map(|target| self.predictions.get(target))
            .map(|p| RecentPrediction {
                target: p.target,
                origin: p.origin,
                suits: p.suits.clone(),
                status: p.glyph().to_string(),
            })
            .collect()
    }

    /// Drop pending state and dedupe markers
    pub fn reset(&mut self, scope: ResetScope) {
        self.predictions.clear();
        self.claim_order.clear();
        self.scheduler_marks.clear();
        self.processed_games.clear();
        self.last_trigger_digit = None;

        if scope == ResetScope::Full {
            self.history.clear();
            self.resolved_targets.clear();
        }
        info!(?scope, history_len = self.history.len(), "ledger reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Offset, Outcome};

    fn success(by: GameNumber, offset: Offset) -> Resolution {
        Resolution {
            outcome: Outcome::Success(offset),
            resolved_by: by,
        }
    }

    #[test]
    fn test_claim_is_exclusive_across_origins() {
        let mut ledger = Ledger::new();
        assert!(ledger.try_claim(1240, Origin::Manual, None).is_ok());

        let conflict = ledger.try_claim(1240, Origin::Scheduled, None).unwrap_err();
        assert_eq!(
            conflict,
            ClaimConflict::Occupied {
                target: 1240,
                origin: Origin::Manual
            }
        );
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_resolve_exactly_once() {
        let mut ledger = Ledger::new();
        ledger.try_claim(10, Origin::Manual, None).unwrap();

        let entry = ledger.resolve(10, success(11, Offset::One)).unwrap();
        assert_eq!(entry.glyph(), "✅1️⃣");
        assert!(matches!(
            ledger.resolve(10, success(10, Offset::Zero)),
            Err(TableauError::AlreadyResolved(10))
        ));
        assert!(matches!(
            ledger.resolve(20, success(20, Offset::Zero)),
            Err(TableauError::PredictionNotFound(20))
        ));
        assert_eq!(ledger.history().len(), 1);

        // Resolved targets never come back as pending
        assert!(ledger.try_claim(10, Origin::Manual, None).is_err());
    }

    #[test]
    fn test_pending_scoped_by_origin() {
        let mut ledger = Ledger::new();
        ledger.try_claim(30, Origin::Scheduled, None).unwrap();
        ledger.try_claim(20, Origin::Manual, None).unwrap();

        assert_eq!(ledger.pending_targets(None), vec![20, 30]);
        assert_eq!(ledger.pending_targets(Some(Origin::Scheduled)), vec![30]);
        assert!(ledger.pending_at(30, Some(Origin::Manual)).is_none());
        assert!(ledger.pending_at(30, Some(Origin::Scheduled)).is_some());
    }

    #[test]
    fn test_reset_keep_history_blocks_reclaim() {
        let mut ledger = Ledger::new();
        ledger.try_claim(10, Origin::Manual, None).unwrap();
        ledger.try_claim(20, Origin::Scheduled, None).unwrap();
        ledger
            .resolve(
                10,
                Resolution {
                    outcome: Outcome::Failure(FailureKind::Expired),
                    resolved_by: 13,
                },
            )
            .unwrap();
        ledger.mark_processed(7);
        ledger.set_last_trigger_digit(7);

        ledger.reset(ResetScope::KeepHistory);
        assert_eq!(ledger.pending_count(), 0);
        assert!(!ledger.is_processed(7));
        assert_eq!(ledger.last_trigger_digit(), None);
        assert_eq!(ledger.history().len(), 1);
        assert_eq!(
            ledger.try_claim(10, Origin::Manual, None).unwrap_err(),
            ClaimConflict::Resolved { target: 10 }
        );
        assert!(ledger.try_claim(20, Origin::Manual, None).is_ok());

        ledger.reset(ResetScope::Full);
        assert!(ledger.history().is_empty());
        assert!(ledger.try_claim(10, Origin::Manual, None).is_ok());
    }

    #[test]
    fn test_statistics_and_recent() {
        let mut ledger = Ledger::new();
        for target in [10, 20, 30] {
            ledger
                .try_claim(target, Origin::Manual, Some("♠".to_string()))
                .unwrap();
        }
        ledger.resolve(10, success(10, Offset::Zero)).unwrap();
        ledger
            .resolve(
                20,
                Resolution {
                    outcome: Outcome::Failure(FailureKind::InvalidDistribution),
                    resolved_by: 21,
                },
            )
            .unwrap();

        let stats = ledger.statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.pending, 1);
        assert!((stats.win_rate - 50.0).abs() < f64::EPSILON);

        let recent = ledger.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].target, 20);
        assert_eq!(recent[0].status, "❌❌");
        assert_eq!(recent[1].status, "⌛");
    }

    #[test]
    fn test_bind_message() {
        let mut ledger = Ledger::new();
        ledger.try_claim(40, Origin::Manual, None).unwrap();
        let msg = MessageRef {
            chat_id: -100,
            message_id: 7,
        };
        ledger.bind_message(40, msg).unwrap();
        assert_eq!(ledger.get(40).unwrap().message, Some(msg));
        assert!(ledger.bind_message(41, msg).is_err());
    }

    #[test]
    fn test_bind_after_resolution_rejected() {
        let mut ledger = Ledger::new();
        ledger.try_claim(40, Origin::Scheduled, None).unwrap();
        ledger.resolve(40, success(41, Offset::One)).unwrap();

        let msg = MessageRef {
            chat_id: -100,
            message_id: 8,
        };
        assert!(matches!(
            ledger.bind_message(40, msg),
            Err(TableauError::AlreadyResolved(40))
        ));
        assert_eq!(ledger.get(40).unwrap().message, None);
    }
}
