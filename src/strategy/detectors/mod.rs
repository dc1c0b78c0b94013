//! Signal detectors
//!
//! - Trigger detector: opens feed-triggered predictions

pub mod trigger;

pub use trigger::{next_round_target, TriggerDetector, TriggerDetectorConfig, TriggerSignal};
