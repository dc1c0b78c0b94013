//! Rendered message templates
//!
//! The exact text is relied on by channel readers; keep it byte-stable.

use std::fmt::Write;

use super::report::BatchReport;
use crate::domain::{GameNumber, PENDING_GLYPH};

/// Status line for a prediction with the given glyph
pub fn prediction_line(target: GameNumber, glyph: &str) -> String {
    format!("🎯Nº:{target} 🔵Dis🔵tri🚥:statut :{glyph}")
}

/// Status line for a freshly opened prediction
pub fn pending_line(target: GameNumber) -> String {
    prediction_line(target, PENDING_GLYPH)
}

pub fn batch_report(report: &BatchReport) -> String {
    let mut text = format!("📊 Bilan des {} dernières prédictions :\n", report.total);
    for entry in &report.entries {
        let _ = writeln!(text, "🔵{}📌 D🔵 statut :{}", entry.target, entry.glyph());
    }
    let _ = write!(
        text,
        "\n📈 Statistiques: {}/{} ({:.1}% de réussite)",
        report.wins, report.total, report.success_rate
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Offset, Origin, Outcome, ResolvedEntry};

    #[test]
    fn test_prediction_lines() {
        assert_eq!(pending_line(1240), "🎯Nº:1240 🔵Dis🔵tri🚥:statut :⌛");
        assert_eq!(
            prediction_line(1240, "✅1️⃣"),
            "🎯Nº:1240 🔵Dis🔵tri🚥:statut :✅1️⃣"
        );
    }

    #[test]
    fn test_batch_report_text() {
        let report = BatchReport::from_entries(&[
            ResolvedEntry {
                target: 10,
                origin: Origin::Manual,
                outcome: Outcome::Success(Offset::Zero),
            },
            ResolvedEntry {
                target: 20,
                origin: Origin::Scheduled,
                outcome: Outcome::Failure(FailureKind::Expired),
            },
            ResolvedEntry {
                target: 30,
                origin: Origin::Manual,
                outcome: Outcome::Success(Offset::Two),
            },
        ]);

        assert_eq!(
            batch_report(&report),
            "📊 Bilan des 3 dernières prédictions :\n\
             🔵10📌 D🔵 statut :✅0️⃣\n\
             🔵20📌 D🔵 statut :📌❌\n\
             🔵30📌 D🔵 statut :✅2️⃣\n\
             \n📈 Statistiques: 2/3 (66.7% de réussite)"
        );
    }
}
