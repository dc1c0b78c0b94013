//! Suit symbols inside a parenthesized card group
//!
//! Each suit has a plain form (`♠`) and a decorated emoji form (`♠️`, the
//! plain symbol followed by U+FE0F). A decorated symbol counts once.

use serde::{Deserialize, Serialize};
use std::fmt;

const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Card suits, declared in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    Spade,
    Club,
    Heart,
    Diamond,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Club, Suit::Heart, Suit::Diamond];

    pub fn symbol(&self) -> char {
        match self {
            Suit::Spade => '♠',
            Suit::Club => '♣',
            Suit::Heart => '♥',
            Suit::Diamond => '♦',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '♠' => Some(Suit::Spade),
            '♣' => Some(Suit::Club),
            '♥' => Some(Suit::Heart),
            '♦' => Some(Suit::Diamond),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Card symbol tally for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardCount {
    pub decorated: usize,
    pub plain: usize,
}

impl CardCount {
    pub fn total(&self) -> usize {
        self.decorated + self.plain
    }
}

/// Count card symbols, decorated forms first so they are never counted twice
pub fn count_cards(group: &str) -> CardCount {
    let mut count = CardCount::default();
    let mut chars = group.chars().peekable();

    while let Some(c) = chars.next() {
        if Suit::from_symbol(c).is_none() {
            continue;
        }
        if chars.peek() == Some(&VARIATION_SELECTOR) {
            chars.next();
            count.decorated += 1;
        } else {
            count.plain += 1;
        }
    }

    count
}

/// Distinct suits of a group, sorted in canonical order
pub fn suit_set(group: &str) -> Vec<Suit> {
    let mut suits: Vec<Suit> = group.chars().filter_map(Suit::from_symbol).collect();
    suits.sort();
    suits.dedup();
    suits
}

/// Suit combination text used in predictions (e.g. `♠♥`)
pub fn normalize_suits(group: &str) -> String {
    suit_set(group).iter().map(Suit::symbol).collect()
}

/// A raw parenthesized span with its derived views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardGroup {
    pub raw: String,
}

impl CardGroup {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn count(&self) -> CardCount {
        count_cards(&self.raw)
    }

    pub fn suits(&self) -> Vec<Suit> {
        suit_set(&self.raw)
    }

    pub fn combination(&self) -> String {
        normalize_suits(&self.raw)
    }

    /// Exactly two cards were dealt into this group
    pub fn is_two_card(&self) -> bool {
        self.count().total() == 2
    }
}
