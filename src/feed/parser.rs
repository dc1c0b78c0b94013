//! Event parser for raw feed messages
//!
//! Pulls the game number (`#N1234.` or the looser `game #1234`) and the
//! parenthesized card groups out of a message. Missing pieces are `None` /
//! empty, never errors: most feed traffic is noise.

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use super::cards::CardGroup;
use crate::domain::GameNumber;

static GAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#N\s*(\d+)\.?").unwrap_or_else(|e| panic!("invalid game token regex: {e}"))
});

static GAME_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:game|jeu)\s*#?\s*(\d+)")
        .unwrap_or_else(|e| panic!("invalid game phrase regex: {e}"))
});

static CARD_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([^)]*)\)").unwrap_or_else(|e| panic!("invalid card group regex: {e}"))
});

/// Extract the game number, preferring the `#N` token over the phrase form
pub fn extract_game_number(message: &str) -> Option<GameNumber> {
    let number = [&*GAME_TOKEN, &*GAME_PHRASE]
        .iter()
        .find_map(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<GameNumber>().ok());

    trace!(?number, "game number extraction");
    number
}

/// Raw text of every parenthesized span, in document order
pub fn extract_card_groups(message: &str) -> Vec<CardGroup> {
    CARD_GROUP
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .map(|m| CardGroup::new(m.as_str()))
        .collect()
}

/// True when the message carries any of the given markers
pub fn contains_any<S: AsRef<str>>(message: &str, markers: &[S]) -> bool {
    markers.iter().any(|m| message.contains(m.as_ref()))
}

/// A feed event after parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub text: String,
    pub game: Option<GameNumber>,
    pub groups: Vec<CardGroup>,
}

impl ParsedEvent {
    pub fn parse(message: &str) -> Self {
        Self {
            text: message.to_string(),
            game: extract_game_number(message),
            groups: extract_card_groups(message),
        }
    }

    pub fn has_marker<S: AsRef<str>>(&self, markers: &[S]) -> bool {
        contains_any(&self.text, markers)
    }

    pub fn first_group(&self) -> Option<&CardGroup> {
        self.groups.first()
    }

    /// First two groups, when the event carries both hands
    pub fn hands(&self) -> Option<(&CardGroup, &CardGroup)> {
        match self.groups.as_slice() {
            [first, second, ..] => Some((first, second)),
            _ => None,
        }
    }
}
