mod admin;
mod callback_received;
mod link_received;
mod text_received;

use teloxide::{prelude::*, types::User};

use crate::{
    db::{Store, UserProfile},
    errors::BotResult,
    keyboards,
    settings::RequiredChannel,
    state::AppState,
    subscription::{subscription_prompt_text, unsubscribed_channels},
    utils::send_html,
};

pub use callback_received::callback_received;
pub use text_received::text_received;

pub const WELCOME: &str = "👋 <b>Hi!</b>\n\n\
    Send me a YouTube link and I'll send the video back to you.";

pub const MAIN_MENU: &str = "🏠 <b>Main menu</b>\n\nSend me a YouTube link to download a video.";

pub const ADMIN_MENU: &str = "🥰 <b>Hi, admin!</b>\n\nChoose an action:";

/// Record (or refresh) whoever sent an update; every update type goes through here
pub async fn remember_sender(store: &Store, user: &User) {
    store.upsert_user(&UserProfile::from(user)).await;
}

/// Check the gate and send the subscription prompt if the user isn't through.
/// Returns whether the user may continue.
pub async fn ensure_subscribed(
    bot: &Bot,
    state: &AppState,
    user_id: UserId,
    chat_id: ChatId,
) -> BotResult<bool> {
    let channels = state.settings.required_channels().await;
    let missing = unsubscribed_channels(bot, &channels, user_id).await;
    if missing.is_empty() {
        return Ok(true);
    }

    send_subscription_prompt(bot, chat_id, &missing).await?;
    Ok(false)
}

pub async fn send_subscription_prompt(
    bot: &Bot,
    chat_id: ChatId,
    missing: &[RequiredChannel],
) -> BotResult<()> {
    send_html(
        bot,
        chat_id,
        &subscription_prompt_text(missing),
        Some(keyboards::subscription_prompt(missing)),
    )
    .await?;
    Ok(())
}
