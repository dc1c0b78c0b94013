use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Game identifier parsed from a feed event
pub type GameNumber = u64;

/// Pending glyph shown until a prediction resolves
pub const PENDING_GLYPH: &str = "⌛";

/// Who opened a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Opened by the trigger detector from a feed event
    Manual,
    /// Opened by the autonomous scheduler
    Scheduled,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Manual => "manual",
            Origin::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distance between a target and the game that resolved it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Offset {
    Zero,
    One,
    Two,
}

impl Offset {
    /// Offsets in tie-break order
    pub const ALL: [Offset; 3] = [Offset::Zero, Offset::One, Offset::Two];

    /// Largest offset still inside the grace window
    pub const MAX: u64 = 2;

    pub fn value(&self) -> u64 {
        match self {
            Offset::Zero => 0,
            Offset::One => 1,
            Offset::Two => 2,
        }
    }
}

/// Why a prediction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Matched inside the window but the cards were not dealt 2+2
    InvalidDistribution,
    /// No match before the grace window closed
    Expired,
}

/// Final outcome of a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Success(Offset),
    Failure(FailureKind),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Status glyph rendered for this outcome.
    ///
    /// Failures are marked differently depending on who opened the prediction.
    pub fn glyph(&self, origin: Origin) -> &'static str {
        match (self, origin) {
            (Outcome::Success(Offset::Zero), _) => "✅0️⃣",
            (Outcome::Success(Offset::One), _) => "✅1️⃣",
            (Outcome::Success(Offset::Two), _) => "✅2️⃣",
            (Outcome::Failure(_), Origin::Manual) => "❌❌",
            (Outcome::Failure(_), Origin::Scheduled) => "📌❌",
        }
    }
}

/// Reference to a rendered message, handed back by the outbound collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// How a prediction was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Game number of the event that resolved it
    pub resolved_by: GameNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionStatus {
    Pending,
    Resolved(Resolution),
}

impl PredictionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, PredictionStatus::Pending)
    }
}

/// A bet on a future game number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub target: GameNumber,
    pub origin: Origin,
    /// Normalized suit combination that licensed the prediction (feed-triggered only)
    pub suits: Option<String>,
    pub status: PredictionStatus,
    pub message: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
}

impl Prediction {
    pub fn new(target: GameNumber, origin: Origin, suits: Option<String>) -> Self {
        Self {
            target,
            origin,
            suits,
            status: PredictionStatus::Pending,
            message: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Glyph for the current status
    pub fn glyph(&self) -> &'static str {
        match self.status {
            PredictionStatus::Pending => PENDING_GLYPH,
            PredictionStatus::Resolved(r) => r.outcome.glyph(self.origin),
        }
    }
}

/// One line of the append-only resolution history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub target: GameNumber,
    pub origin: Origin,
    pub outcome: Outcome,
}

impl ResolvedEntry {
    pub fn glyph(&self) -> &'static str {
        self.outcome.glyph(self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_values() {
        assert_eq!(Offset::ALL.iter().map(|o| o.value()).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_glyphs() {
        assert_eq!(Outcome::Success(Offset::One).glyph(Origin::Manual), "✅1️⃣");
        assert_eq!(
            Outcome::Failure(FailureKind::Expired).glyph(Origin::Manual),
            "❌❌"
        );
        assert_eq!(
            Outcome::Failure(FailureKind::InvalidDistribution).glyph(Origin::Scheduled),
            "📌❌"
        );

        let p = Prediction::new(1240, Origin::Manual, Some("♠♥".to_string()));
        assert_eq!(p.glyph(), PENDING_GLYPH);
    }
}
