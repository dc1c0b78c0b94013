//! Prediction desk coordinator
//!
//! `Desk` owns the ledger and every component that reads or writes it.
//! `Runtime` feeds it from the event stream and the scheduler clock and
//! hands the resulting intents to the outbound collaborator and the store.

pub mod command;
pub mod desk;
pub mod runtime;
pub mod state;

pub use command::{DeskCommand, Intent};
pub use desk::Desk;
pub use runtime::{desk_channel, DeskHandle, DeskInbox, Dispatcher, FeedMessage, Runtime};
pub use state::DeskStatus;
