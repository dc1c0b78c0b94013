pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod persistence;
pub mod scheduler;
pub mod strategy;

pub use adapters::{LogOutbound, Outbound, PostgresStore};
pub use config::AppConfig;
pub use coordinator::{desk_channel, Desk, DeskHandle, DeskStatus, Intent, Runtime};
pub use domain::{GameNumber, MessageRef, Origin, Outcome, Prediction};
pub use error::{Result, TableauError};
pub use feed::ParsedEvent;
pub use ledger::{Ledger, ResetScope};
pub use persistence::{JsonFileStore, MemoryStore, ScheduleStore};
pub use scheduler::{AutonomousScheduler, Timetable};
pub use strategy::{OutcomeVerifier, ReportAggregator, TriggerDetector};
