use std::fmt;

use async_trait::async_trait;
use teloxide::prelude::*;

use crate::{
    errors::BotResult,
    utils::{PlainFallback, send_formatted},
};

/// Delivers one broadcast message to one user
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, user_id: i64, text: &str) -> BotResult<()>;
}

#[async_trait]
impl Deliver for Bot {
    async fn deliver(&self, user_id: i64, text: &str) -> BotResult<()> {
        send_formatted(self, ChatId(user_id), text, PlainFallback::Verbatim, None).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

impl fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delivered: {}, Failed: {}", self.delivered, self.failed)
    }
}

/// Send `text` to every recipient. Failures are counted, never retried,
/// and never stop the remaining deliveries.
pub async fn broadcast<D: Deliver>(sink: &D, recipients: &[i64], text: &str) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for &user_id in recipients {
        match sink.deliver(user_id, text).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                log::warn!("Failed to send broadcast to {}: {}", user_id, e);
                report.failed += 1;
            }
        }
    }

    log::info!("Broadcast finished: {}", report);
    report
}
