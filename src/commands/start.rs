use std::sync::Arc;

use teloxide::prelude::*;

use crate::{
    errors::HandlerResult,
    handlers::{WELCOME, ensure_subscribed, remember_sender},
    keyboards,
    state::AppState,
    utils::send_html,
};

pub async fn start(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    log::info!(
        "/start from user {} (@{})",
        user.id.0,
        user.username.as_deref().unwrap_or("-")
    );

    remember_sender(&state.store, user).await;

    if !ensure_subscribed(&bot, &state, user.id, msg.chat.id).await? {
        return Ok(());
    }

    send_html(&bot, msg.chat.id, WELCOME, Some(keyboards::main_menu())).await?;
    Ok(())
}
