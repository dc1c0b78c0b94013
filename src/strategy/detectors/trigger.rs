//! Trigger detector for feed-opened predictions
//!
//! A game whose last digit is in the trigger set opens a prediction on the
//! next round-numbered game (`1237` → `1240`), provided nobody holds that
//! target yet.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::{GameNumber, Origin};
use crate::feed::ParsedEvent;
use crate::ledger::Ledger;

/// Configuration for trigger detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDetectorConfig {
    /// Last digits that license a prediction
    pub trigger_digits: Vec<u8>,
    /// Chance of skipping a trigger that repeats the previous digit.
    /// Dampens runs of identical triggers; 0 disables it.
    pub variability_skip_probability: f64,
}

impl Default for TriggerDetectorConfig {
    fn default() -> Self {
        Self {
            trigger_digits: vec![6, 7, 8, 9],
            variability_skip_probability: 0.3,
        }
    }
}

impl From<&EngineConfig> for TriggerDetectorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            trigger_digits: config.trigger_digits.clone(),
            variability_skip_probability: config.variability_skip_probability,
        }
    }
}

/// A newly opened prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSignal {
    /// Game number that fired the trigger
    pub source_game: GameNumber,
    /// Round-numbered game being predicted
    pub target: GameNumber,
    /// Normalized suit combination from the first card group
    pub suits: String,
    pub trigger_digit: u8,
}

/// Next round-numbered game after `game`
pub fn next_round_target(game: GameNumber) -> GameNumber {
    (game / 10 + 1) * 10
}

#[derive(Debug)]
pub struct TriggerDetector {
    config: TriggerDetectorConfig,
    rng: StdRng,
}

impl TriggerDetector {
    pub fn new(config: TriggerDetectorConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &TriggerDetectorConfig {
        &self.config
    }

    /// Decide whether `event` opens a prediction; commits it to the ledger if so
    pub fn on_event(&mut self, ledger: &mut Ledger, event: &ParsedEvent) -> Option<TriggerSignal> {
        let game = event.game?;

        let digit = (game % 10) as u8;
        if !self.config.trigger_digits.contains(&digit) {
            return None;
        }

        if ledger.last_trigger_digit() == Some(digit) && self.should_skip_repeat() {
            debug!(game, digit, "repeated trigger digit skipped for variability");
            return None;
        }

        let target = next_round_target(game);
        if let Err(conflict) = ledger.check_claim(target) {
            debug!(game, target, %conflict, "trigger ignored, target taken");
            return None;
        }

        if ledger.is_processed(game) {
            debug!(game, "trigger ignored, game already processed");
            return None;
        }

        let suits = event.first_group()?.combination();
        if suits.is_empty() {
            debug!(game, "trigger ignored, first group has no suits");
            return None;
        }

        if let Err(conflict) = ledger.try_claim(target, Origin::Manual, Some(suits.clone())) {
            debug!(game, target, %conflict, "trigger lost the claim");
            return None;
        }
        ledger.mark_processed(game);
        ledger.set_last_trigger_digit(digit);

        info!(
            source_game = game,
            target,
            digit,
            suits = %suits,
            "trigger signal: prediction opened"
        );

        Some(TriggerSignal {
            source_game: game,
            target,
            suits,
            trigger_digit: digit,
        })
    }

    fn should_skip_repeat(&mut self) -> bool {
        let p = self.config.variability_skip_probability;
        p > 0.0 && self.rng.gen::<f64>() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PredictionStatus;

    fn detector(digits: &[u8], skip: f64) -> TriggerDetector {
        TriggerDetector::new(
            TriggerDetectorConfig {
                trigger_digits: digits.to_vec(),
                variability_skip_probability: skip,
            },
            Some(7),
        )
    }

    fn event(text: &str) -> ParsedEvent {
        ParsedEvent::parse(text)
    }

    #[test]
    fn test_next_round_target() {
        assert_eq!(next_round_target(1234), 1240);
        assert_eq!(next_round_target(1239), 1240);
        assert_eq!(next_round_target(1240), 1250);
        assert_eq!(next_round_target(6), 10);
    }

    #[test]
    fn test_trigger_opens_prediction() {
        let mut ledger = Ledger::new();
        let mut detector = detector(&[4], 0.0);

        let signal = detector
            .on_event(&mut ledger, &event("#N1234. (♥♠) - (♦)"))
            .unwrap();
        assert_eq!(signal.target, 1240);
        assert_eq!(signal.suits, "♠♥");
        assert_eq!(signal.trigger_digit, 4);

        let prediction = ledger.get(1240).unwrap();
        assert_eq!(prediction.origin, Origin::Manual);
        assert_eq!(prediction.status, PredictionStatus::Pending);
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_non_trigger_digit_ignored() {
        let mut ledger = Ledger::new();
        let mut detector = detector(&[6, 7, 8, 9], 0.0);
        assert!(detector.on_event(&mut ledger, &event("#N1234. (♠♥)")).is_none());
        assert!(detector.on_event(&mut ledger, &event("no number (♠♥)")).is_none());
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn test_same_event_twice_claims_once() {
        let mut ledger = Ledger::new();
        let mut detector = detector(&[7], 0.0);
        let e = event("#N1237. (♣♦)");

        assert!(detector.on_event(&mut ledger, &e).is_some());
        assert!(detector.on_event(&mut ledger, &e).is_none());
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_second_trigger_for_same_target_rejected() {
        let mut ledger = Ledger::new();
        let mut detector = detector(&[7, 8], 0.0);

        assert!(detector.on_event(&mut ledger, &event("#N1237. (♣)")).is_some());
        assert!(detector.on_event(&mut ledger, &event("#N1238. (♥)")).is_none());
        assert_eq!(ledger.get(1240).unwrap().suits.as_deref(), Some("♣"));
    }

    #[test]
    fn test_scheduler_claim_blocks_trigger() {
        let mut ledger = Ledger::new();
        ledger.try_claim(1240, Origin::Scheduled, None).unwrap();
        let mut detector = detector(&[7], 0.0);

        assert!(detector.on_event(&mut ledger, &event("#N1237. (♣)")).is_none());
        assert!(!ledger.is_processed(1237));
    }

    #[test]
    fn test_missing_or_empty_group_rejected() {
        let mut ledger = Ledger::new();
        let mut detector = detector(&[7], 0.0);

        assert!(detector.on_event(&mut ledger, &event("#N1237.")).is_none());
        assert!(detector.on_event(&mut ledger, &event("#N1237. (10 K)")).is_none());
        assert_eq!(ledger.pending_count(), 0);
        assert!(!ledger.is_processed(1237));
    }

    #[test]
    fn test_variability_skip_always_and_never() {
        let mut ledger = Ledger::new();
        let mut always = detector(&[7], 1.0);

        // First trigger of a digit is never skipped
        assert!(always.on_event(&mut ledger, &event("#N1237. (♣)")).is_some());
        // Repeat of digit 7 is always skipped at p = 1
        assert!(always.on_event(&mut ledger, &event("#N1247. (♣)")).is_none());

        let mut never = detector(&[7], 0.0);
        assert!(never.on_event(&mut ledger, &event("#N1247. (♣)")).is_some());
    }
}
