//! Outbound collaborator
//!
//! The core only decides what to say; an `Outbound` implementation talks to
//! the messaging platform. `LogOutbound` is the dry-run implementation used
//! by the binary.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

use crate::domain::MessageRef;
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send `text` to `channel`, returning a handle for later edits
    async fn emit(&self, channel: i64, text: &str) -> Result<MessageRef>;

    /// Replace the text of a previously sent message
    async fn edit(&self, message: MessageRef, text: &str) -> Result<()>;
}

/// Logs every intent instead of sending it
#[derive(Debug, Default)]
pub struct LogOutbound {
    next_id: AtomicI64,
}

impl LogOutbound {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Outbound for LogOutbound {
    async fn emit(&self, channel: i64, text: &str) -> Result<MessageRef> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(channel, message_id, text, "emit");
        Ok(MessageRef {
            chat_id: channel,
            message_id,
        })
    }

    async fn edit(&self, message: MessageRef, text: &str) -> Result<()> {
        info!(
            channel = message.chat_id,
            message_id = message.message_id,
            text,
            "edit"
        );
        Ok(())
    }
}
