//! Prediction strategy
//!
//! ## Architecture
//!
//! - `detectors/` - Trigger detector, opens feed-triggered predictions
//! - `verifier` - Offset window matching and expiry
//! - `report` - Batch report aggregator
//! - `render` - Message templates for the outbound collaborator
//!
//! All of them read and write the shared [`Ledger`](crate::ledger::Ledger);
//! none of them owns prediction state.

// =============================================================================
// Event-driven components
// =============================================================================

pub mod detectors;
pub mod verifier;

pub use detectors::{next_round_target, TriggerDetector, TriggerDetectorConfig, TriggerSignal};
pub use verifier::{OutcomeVerifier, Verification, VerifierConfig};

// =============================================================================
// Reporting
// =============================================================================

pub mod render;
pub mod report;

pub use report::{BatchReport, ReportAggregator};
