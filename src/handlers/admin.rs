//! Admin panel actions and the follow-up messages they wait for.

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
    utils::html,
};
use tokio::fs;

use super::ADMIN_MENU;
use crate::{
    broadcast::broadcast,
    callbacks::AdminAction,
    db::Statistics,
    errors::HandlerResult,
    keyboards,
    session::AdminSession,
    settings::SettingKey,
    state::AppState,
    temp_file::TempFile,
    utils::send_html,
};

/// How many of the ranked users the statistics message shows
const STATISTICS_TOP: usize = 5;

pub async fn admin_action(
    bot: &Bot,
    chat_id: ChatId,
    user_id: UserId,
    action: AdminAction,
    state: &AppState,
) -> HandlerResult {
    log::info!("Admin {} requested {}", user_id.0, action);

    match action {
        AdminAction::ExportJson => export_json(bot, chat_id, state).await,
        AdminAction::ExportSql => export_sql(bot, chat_id, state).await,
        AdminAction::ExportSettings => export_settings(bot, chat_id, user_id, state).await,
        AdminAction::Statistics => {
            match state.store.statistics().await {
                Some(stats) => {
                    send_html(bot, chat_id, &statistics_text(&stats), None).await?;
                }
                None => {
                    bot.send_message(chat_id, "❌ Error getting statistics").await?;
                }
            }
            Ok(())
        }
        AdminAction::ChangeChannelId => {
            let session = AdminSession::AwaitingSettingValue {
                key: SettingKey::ChannelId,
            };
            state.sessions.begin(user_id, session).await;
            bot.send_message(chat_id, "Send the new channel ID:").await?;
            Ok(())
        }
        AdminAction::ChangeChannelUrl => {
            let session = AdminSession::AwaitingSettingValue {
                key: SettingKey::ChannelUrl,
            };
            state.sessions.begin(user_id, session).await;
            bot.send_message(chat_id, "Send the new channel link:").await?;
            Ok(())
        }
        AdminAction::Broadcast => {
            state
                .sessions
                .begin(user_id, AdminSession::AwaitingBroadcastText)
                .await;
            bot.send_message(chat_id, "Send the message to broadcast to every user:")
                .await?;
            Ok(())
        }
    }
}

/// Handle the text an admin sent while a session was pending
pub async fn session_reply(
    bot: &Bot,
    chat_id: ChatId,
    session: AdminSession,
    text: &str,
    state: &AppState,
) -> HandlerResult {
    match session {
        AdminSession::AwaitingSettingValue { key } => match state.settings.set(key, text).await {
            Ok(()) => {
                let reply = format!("✅ <b>{} updated!</b>\n\n{}", key, ADMIN_MENU);
                send_html(bot, chat_id, &reply, Some(keyboards::admin_menu())).await?;
            }
            Err(e) => {
                log::error!("Failed to save setting {}: {}", key, e);
                bot.send_message(chat_id, "❌ Error saving settings.").await?;
            }
        },
        AdminSession::AwaitingBroadcastText => {
            let recipients = state.store.user_ids().await;
            log::info!("Broadcasting to {} users", recipients.len());
            let report = broadcast(bot, &recipients, text).await;
            let reply = format!("📣 <b>Broadcast finished</b>\n\n{}", report);
            send_html(bot, chat_id, &reply, Some(keyboards::admin_menu())).await?;
        }
    }
    Ok(())
}

async fn export_json(bot: &Bot, chat_id: ChatId, state: &AppState) -> HandlerResult {
    let Some(path) = state.store.export_json(&state.config.export_dir).await else {
        bot.send_message(chat_id, "❌ Error exporting to JSON").await?;
        return Ok(());
    };
    let stats = state.store.statistics().await.unwrap_or_default();
    let caption = format!(
        "📊 <b>User database (JSON)</b>\n\n{}",
        summary_lines(&stats)
    );
    send_export(bot, chat_id, TempFile::new(path), caption).await
}

async fn export_sql(bot: &Bot, chat_id: ChatId, state: &AppState) -> HandlerResult {
    let Some(path) = state.store.export_sql(&state.config.export_dir).await else {
        bot.send_message(chat_id, "❌ Error exporting to SQL").await?;
        return Ok(());
    };
    let stats = state.store.statistics().await.unwrap_or_default();
    let caption = format!(
        "🗄️ <b>Database dump (SQL)</b>\n\n{}\n\n<i>Restore with: sqlite3 new.db &lt; dump.sql</i>",
        summary_lines(&stats)
    );
    send_export(bot, chat_id, TempFile::new(path), caption).await
}

async fn export_settings(
    bot: &Bot,
    chat_id: ChatId,
    user_id: UserId,
    state: &AppState,
) -> HandlerResult {
    let settings = state.settings.snapshot().await;
    let file = TempFile::new(
        state
            .config
            .export_dir
            .join(format!("settings_export_{}.json", user_id.0)),
    );
    fs::write(file.path(), settings.to_pretty_json()?).await?;

    let caption = format!(
        "⚙️ <b>Current bot settings</b>\n\n<code>{}</code>",
        html::escape(&state.settings.path().display().to_string())
    );
    send_export(bot, chat_id, file, caption).await
}

/// Send an export document; the file is removed whether or not it got through
async fn send_export(
    bot: &Bot,
    chat_id: ChatId,
    file: TempFile,
    caption: String,
) -> HandlerResult {
    let sent = bot
        .send_document(chat_id, InputFile::file(file.path()))
        .caption(caption)
        .parse_mode(ParseMode::Html)
        .await;
    file.cleanup().await;

    if let Err(e) = sent {
        log::error!("Failed to send export: {}", e);
        bot.send_message(chat_id, "❌ Error sending the file").await?;
    }
    Ok(())
}

fn summary_lines(stats: &Statistics) -> String {
    format!(
        "👥 Total users: {}\n🔥 Active: {}\n📥 Total downloads: {}\n✅ Successful: {}\n📈 Success rate: {:.1}%",
        stats.total_users,
        stats.active_users,
        stats.total_downloads,
        stats.successful_downloads,
        stats.success_rate
    )
}

pub fn statistics_text(stats: &Statistics) -> String {
    let mut text = format!(
        "📊 <b>Bot statistics</b>\n\n\
         👥 <b>Users:</b>\n\
         • Total: {}\n\
         • Active: {}\n\n\
         📥 <b>Downloads:</b>\n\
         • Total: {}\n\
         • Successful: {}\n\
         • Success rate: {:.1}%\n\n\
         🏆 <b>Top users:</b>\n",
        stats.total_users,
        stats.active_users,
        stats.total_downloads,
        stats.successful_downloads,
        stats.success_rate
    );

    if stats.top_users.is_empty() {
        text.push_str("<i>No downloads yet</i>\n");
    }
    for (i, user) in stats.top_users.iter().take(STATISTICS_TOP).enumerate() {
        text.push_str(&format!(
            "{}. {} - {} downloads\n",
            i + 1,
            html::escape(&user.display_name()),
            user.download_count
        ));
    }
    text
}
