//! Persistence layer for timetable recovery
//!
//! - `ScheduleStore` trait used by the runtime
//! - JSON file store (default) and in-memory store
//!
//! The PostgreSQL implementation lives in `adapters::postgres`.

pub mod schedule_store;

pub use schedule_store::{JsonFileStore, MemoryStore, ScheduleStore};
