//! Outcome verifier
//!
//! Matches a feed event against pending predictions. The target `T` may be
//! settled by the event for `T`, `T+1` or `T+2`; the smallest offset wins.
//! Once an event past `T+2` arrives the prediction is failed as expired.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::{
    FailureKind, GameNumber, Offset, Origin, Outcome, Resolution, ResolvedEntry,
};
use crate::feed::ParsedEvent;
use crate::ledger::Ledger;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Glyphs that mark an event as a result worth checking
    pub markers: Vec<String>,
    /// "Re-check later" glyph; only runs the expiry sweep
    pub overflow_marker: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            markers: ["✅", "🔰", "❌", "⭕", "⏰"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            overflow_marker: "⏰".to_string(),
        }
    }
}

impl From<&EngineConfig> for VerifierConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            markers: config.verification_markers.clone(),
            overflow_marker: config.overflow_marker.clone(),
        }
    }
}

/// A prediction settled by the verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub target: GameNumber,
    pub origin: Origin,
    pub outcome: Outcome,
    pub resolved_by: GameNumber,
}

impl Verification {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn entry(&self) -> ResolvedEntry {
        ResolvedEntry {
            target: self.target,
            origin: self.origin,
            outcome: self.outcome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeVerifier {
    config: VerifierConfig,
}

impl OutcomeVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Resolve at most one pending prediction of origin `scope` from `event`
    pub fn on_event(
        &self,
        ledger: &mut Ledger,
        event: &ParsedEvent,
        scope: Origin,
    ) -> Option<Verification> {
        if !event.has_marker(&self.config.markers) {
            return None;
        }
        let game = event.game?;

        if event.text.contains(self.config.overflow_marker.as_str()) {
            debug!(game, %scope, "overflow marker, expiry sweep only");
            return self.expire_next(ledger, game, scope);
        }

        let Some((first, second)) = event.hands() else {
            debug!(game, groups = event.groups.len(), "inconclusive, fewer than two groups");
            return None;
        };

        for offset in Offset::ALL {
            let Some(candidate) = game.checked_sub(offset.value()) else {
                continue;
            };
            if ledger.pending_at(candidate, Some(scope)).is_none() {
                continue;
            }

            let outcome = if first.is_two_card() && second.is_two_card() {
                Outcome::Success(offset)
            } else {
                Outcome::Failure(FailureKind::InvalidDistribution)
            };
            debug!(
                game,
                candidate,
                offset = offset.value(),
                first = first.count().total(),
                second = second.count().total(),
                "pending prediction matched"
            );
            return self.settle(ledger, candidate, outcome, game);
        }

        self.expire_next(ledger, game, scope)
    }

    /// Fail the oldest pending prediction of origin `scope` that `game` has left behind
    pub fn expire_next(
        &self,
        ledger: &mut Ledger,
        game: GameNumber,
        scope: Origin,
    ) -> Option<Verification> {
        let overdue = ledger
            .pending_targets(Some(scope))
            .into_iter()
            .find(|&target| game > target.saturating_add(Offset::MAX))?;

        info!(target = overdue, game, %scope, "grace window closed, expiring");
        self.settle(ledger, overdue, Outcome::Failure(FailureKind::Expired), game)
    }

    fn settle(
        &self,
        ledger: &mut Ledger,
        target: GameNumber,
        outcome: Outcome,
        resolved_by: GameNumber,
    ) -> Option<Verification> {
        match ledger.resolve(target, Resolution { outcome, resolved_by }) {
            Ok(entry) => Some(Verification {
                target,
                origin: entry.origin,
                outcome,
                resolved_by,
            }),
            Err(e) => {
                warn!(target, error = %e, "resolution rejected by ledger");
                None
            }
        }
    }
}

impl Default for OutcomeVerifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}
