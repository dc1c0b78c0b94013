use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Bounded memory of recently seen messages, keyed by `channel:content` hash
#[derive(Debug)]
pub struct MessageLog {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn hash_message(channel: i64, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}", channel, content).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Record a message; returns false when it was already seen
    pub fn check_and_mark(&mut self, channel: i64, content: &str) -> bool {
        let hash = Self::hash_message(channel, content);
        if self.seen.contains(&hash) {
            debug!(channel, hash = %&hash[..12], "duplicate message dropped");
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(hash.clone());
        self.order.push_back(hash);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}
