//! Channel membership gate.
//!
//! A user may use the bot only while subscribed to every required channel.
//! Anything we can't verify counts as "not subscribed".

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatMemberStatus, Recipient},
    utils::html,
};

use crate::{errors::BotError, settings::RequiredChannel};

/// Source of membership information for (channel, user) pairs
#[async_trait]
pub trait MembershipProbe: Send + Sync {
    async fn member_status(
        &self,
        channel_id: &str,
        user_id: UserId,
    ) -> Result<ChatMemberStatus, BotError>;
}

#[async_trait]
impl MembershipProbe for Bot {
    async fn member_status(
        &self,
        channel_id: &str,
        user_id: UserId,
    ) -> Result<ChatMemberStatus, BotError> {
        let member = self
            .get_chat_member(channel_recipient(channel_id), user_id)
            .await?;
        Ok(member.status())
    }
}

/// Why a membership query failed; every case denies access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    UserNotFound,
    BotLacksAccess,
    Unknown,
}

pub fn classify_probe_error(error: &BotError) -> ProbeFailure {
    let text = error.to_string().to_lowercase();
    if text.contains("not found") {
        ProbeFailure::UserNotFound
    } else if text.contains("bot is not a member") || text.contains("forbidden") {
        ProbeFailure::BotLacksAccess
    } else {
        ProbeFailure::Unknown
    }
}

/// `-100123` goes by id, anything else is treated as a public `@username`
pub fn channel_recipient(channel_id: &str) -> Recipient {
    let channel_id = channel_id.trim();
    match channel_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if channel_id.starts_with('@') => Recipient::ChannelUsername(channel_id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{}", channel_id)),
    }
}

fn is_subscribed(status: &ChatMemberStatus) -> bool {
    !matches!(status, ChatMemberStatus::Left | ChatMemberStatus::Banned)
}

/// Channels from `channels` the user hasn't joined (or we couldn't check)
pub async fn unsubscribed_channels<P: MembershipProbe>(
    probe: &P,
    channels: &[RequiredChannel],
    user_id: UserId,
) -> Vec<RequiredChannel> {
    let mut missing = Vec::new();

    for channel in channels {
        match probe.member_status(&channel.id, user_id).await {
            Ok(status) if is_subscribed(&status) => {
                log::info!("User {} is subscribed to {}", user_id.0, channel.name);
            }
            Ok(status) => {
                log::info!(
                    "User {} is not subscribed to {} ({:?})",
                    user_id.0,
                    channel.name,
                    status
                );
                missing.push(channel.clone());
            }
            Err(e) => {
                match classify_probe_error(&e) {
                    ProbeFailure::UserNotFound => log::info!(
                        "User {} not found in channel {}, not subscribed",
                        user_id.0,
                        channel.name
                    ),
                    ProbeFailure::BotLacksAccess => log::error!(
                        "Bot can't see members of {}, cannot check subscription: {}",
                        channel.name,
                        e
                    ),
                    ProbeFailure::Unknown => log::error!(
                        "Unknown error checking {} for user {}: {}",
                        channel.name,
                        user_id.0,
                        e
                    ),
                }
                missing.push(channel.clone());
            }
        }
    }

    log::info!("User {} unsubscribed channels: {}", user_id.0, missing.len());
    missing
}

/// Prompt text listing the channels still to join
pub fn subscription_prompt_text(missing: &[RequiredChannel]) -> String {
    let mut text = String::from("⚠️ <b>To use the bot, subscribe to all channels:</b>\n\n");
    for (i, channel) in missing.iter().enumerate() {
        text.push_str(&format!(
            "{}. <a href=\"{}\">{}</a>\n",
            i + 1,
            html::escape(&channel.url),
            html::escape(&channel.name)
        ));
    }
    text.push_str("\n<i>After subscribing to every channel, press the button below:</i>");
    text
}
