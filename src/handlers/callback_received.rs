use std::sync::Arc;

use teloxide::{prelude::*, types::InlineKeyboardMarkup};

use super::{MAIN_MENU, admin, remember_sender, send_subscription_prompt};
use crate::{
    callbacks::CallbackAction,
    errors::{BotError, HandlerResult},
    keyboards,
    settings::{OWNER_URL, PRODUCT_URL},
    state::AppState,
    subscription::unsubscribed_channels,
    utils::{callback_origin, edit_html, send_html},
};

const INFORMATION: &str = "ℹ️ <b>Information</b>\n\n\
    This bot downloads YouTube videos and sends them right into the chat.";

const UNLOCKED: &str = "✅ <b>Thanks for subscribing!</b>\n\n\
    Now send me a YouTube link and I'll download the video for you.";

pub async fn callback_received(
    bot: Bot,
    query: CallbackQuery,
    state: Arc<AppState>,
) -> HandlerResult {
    remember_sender(&state.store, &query.from).await;

    if let Err(e) = handle_callback(&bot, &query, &state).await {
        log::error!(
            "Callback {:?} from user {} failed: {}",
            query.data,
            query.from.id.0,
            e
        );
        if let Err(e) = bot
            .answer_callback_query(query.id.clone())
            .text("An error occurred")
            .await
        {
            log::warn!("Failed to answer callback: {}", e);
        }
    }
    Ok(())
}

async fn handle_callback(bot: &Bot, query: &CallbackQuery, state: &AppState) -> HandlerResult {
    let data = query
        .data
        .as_deref()
        .ok_or_else(|| BotError::general("Callback without data"))?;
    let action = CallbackAction::parse(data)?;
    let user_id = query.from.id;

    match action {
        CallbackAction::CheckSubscription => recheck_subscription(bot, query, state).await,
        CallbackAction::Menu => {
            bot.answer_callback_query(query.id.clone()).await?;
            show_panel(bot, query, MAIN_MENU, keyboards::main_menu()).await
        }
        CallbackAction::Information => {
            bot.answer_callback_query(query.id.clone()).await?;
            let owner = state.settings.get(OWNER_URL).await;
            let product = state.settings.get(PRODUCT_URL).await;
            let markup = keyboards::information(owner.as_deref(), product.as_deref());
            show_panel(bot, query, INFORMATION, markup).await
        }
        CallbackAction::Admin(action) => {
            if !state.config.is_admin(user_id) {
                log::warn!("User {} tried admin action {}", user_id.0, action);
                bot.answer_callback_query(query.id.clone())
                    .text("❌ Access denied!")
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            bot.answer_callback_query(query.id.clone()).await?;
            admin::admin_action(bot, reply_chat(query), user_id, action, state).await
        }
    }
}

async fn recheck_subscription(
    bot: &Bot,
    query: &CallbackQuery,
    state: &AppState,
) -> HandlerResult {
    let user_id = query.from.id;
    let channels = state.settings.required_channels().await;
    let missing = unsubscribed_channels(bot, &channels, user_id).await;

    if missing.is_empty() {
        log::info!("User {} passed the subscription check", user_id.0);
        bot.answer_callback_query(query.id.clone())
            .text("✅ Great! Welcome!")
            .await?;
        return show_panel(bot, query, UNLOCKED, keyboards::main_menu()).await;
    }

    bot.answer_callback_query(query.id.clone())
        .text(format!(
            "❌ You are not subscribed to every channel yet!\nRemaining: {}",
            missing.len()
        ))
        .show_alert(true)
        .await?;

    send_subscription_prompt(bot, reply_chat(query), &missing).await?;
    if let Some((chat_id, message_id)) = callback_origin(query) {
        if let Err(e) = bot.delete_message(chat_id, message_id).await {
            log::warn!("Failed to delete old subscription prompt: {}", e);
        }
    }
    Ok(())
}

/// Chat to answer in: where the button was, or the user's private chat
fn reply_chat(query: &CallbackQuery) -> ChatId {
    callback_origin(query)
        .map(|(chat_id, _)| chat_id)
        .unwrap_or_else(|| ChatId(query.from.id.0 as i64))
}

/// Replace the message the button sits on, or send a new one if it's gone
async fn show_panel(
    bot: &Bot,
    query: &CallbackQuery,
    html: &str,
    markup: InlineKeyboardMarkup,
) -> HandlerResult {
    match callback_origin(query) {
        Some((chat_id, message_id)) => {
            edit_html(bot, chat_id, message_id, html, Some(markup)).await?;
        }
        None => {
            send_html(bot, reply_chat(query), html, Some(markup)).await?;
        }
    }
    Ok(())
}
