//! Feed-side parsing
//!
//! - Event parser: game number and card groups from raw text
//! - Card counting and suit normalization
//! - Optional redelivery dedupe

pub mod cards;
pub mod dedupe;
pub mod parser;

pub use cards::{count_cards, normalize_suits, CardCount, CardGroup, Suit};
pub use dedupe::MessageLog;
pub use parser::{contains_any, extract_card_groups, extract_game_number, ParsedEvent};
