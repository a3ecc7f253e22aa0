use std::path::Path;

use teloxide::{
    ApiError, RequestError,
    prelude::*,
    types::{InlineKeyboardMarkup, MaybeInaccessibleMessage, MessageId, ParseMode},
};
use tokio::fs;
use url::Url;

use crate::errors::BotResult;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

/// Paths that carry the video id as the next segment
const ID_PATHS: &[&str] = &["shorts", "live", "embed"];

/// A single YouTube video link and nothing else
pub fn is_video_link(text: &str) -> bool {
    let Ok(url) = Url::parse(&text.trim().to_lowercase()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let mut segments = url.path_segments().into_iter().flatten();
    match url.host_str() {
        Some("youtu.be") => segments.next().is_some_and(|id| !id.is_empty()),
        Some(host) if YOUTUBE_HOSTS.contains(&host) => match segments.next() {
            Some("watch") => url.query_pairs().any(|(key, id)| key == "v" && !id.is_empty()),
            Some(kind) if ID_PATHS.contains(&kind) => {
                segments.next().is_some_and(|id| !id.is_empty())
            }
            _ => false,
        },
        _ => false,
    }
}

/// Plain-text rendering of a message written with Telegram's HTML subset
pub fn strip_html(html: &str) -> String {
    let mut plain = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }
    plain
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// What goes out as plain text when Telegram can't parse the markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainFallback {
    /// Markup we built ourselves: drop the tags, keep the words
    StripTags,
    /// Text typed by someone else: send it exactly as written
    Verbatim,
}

pub fn fallback_text(html: &str, fallback: PlainFallback) -> String {
    match fallback {
        PlainFallback::StripTags => strip_html(html),
        PlainFallback::Verbatim => html.to_string(),
    }
}

/// Only markup errors are worth a plain-text retry; anything else
/// (blocked bot, missing chat, network) would fail the same way again
pub fn is_markup_rejection(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::CantParseEntities(_)))
}

/// Send an HTML message, falling back to plain text if Telegram rejects the markup
pub async fn send_html(
    bot: &Bot,
    chat_id: ChatId,
    html: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> BotResult<Message> {
    send_formatted(bot, chat_id, html, PlainFallback::StripTags, markup).await
}

pub async fn send_formatted(
    bot: &Bot,
    chat_id: ChatId,
    html: &str,
    fallback: PlainFallback,
    markup: Option<InlineKeyboardMarkup>,
) -> BotResult<Message> {
    let mut request = bot.send_message(chat_id, html).parse_mode(ParseMode::Html);
    if let Some(markup) = markup.clone() {
        request = request.reply_markup(markup);
    }

    match request.await {
        Ok(message) => Ok(message),
        Err(e) if is_markup_rejection(&e) => {
            log::warn!("Formatted message to {} rejected ({}), sending plain text", chat_id, e);
            let mut request = bot.send_message(chat_id, fallback_text(html, fallback));
            if let Some(markup) = markup {
                request = request.reply_markup(markup);
            }
            Ok(request.await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit a message into HTML text, falling back to plain text if Telegram rejects the markup
pub async fn edit_html(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    html: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> BotResult<()> {
    let mut request = bot
        .edit_message_text(chat_id, message_id, html)
        .parse_mode(ParseMode::Html);
    if let Some(markup) = markup.clone() {
        request = request.reply_markup(markup);
    }

    match request.await {
        Ok(_) => Ok(()),
        Err(e) if is_markup_rejection(&e) => {
            log::warn!("Formatted edit in {} rejected ({}), using plain text", chat_id, e);
            let mut request = bot.edit_message_text(chat_id, message_id, strip_html(html));
            if let Some(markup) = markup {
                request = request.reply_markup(markup);
            }
            request.await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Chat and message a callback button was attached to
pub fn callback_origin(query: &CallbackQuery) -> Option<(ChatId, MessageId)> {
    query.message.as_ref().map(|message| match message {
        MaybeInaccessibleMessage::Inaccessible(m) => (m.chat.id, m.message_id),
        MaybeInaccessibleMessage::Regular(m) => (m.chat.id, m.id),
    })
}

/// Remove every file in `dir`, creating it if it doesn't exist yet
pub async fn clear_dir(dir: &Path) -> BotResult<()> {
    fs::create_dir_all(dir).await?;

    let mut entries = fs::read_dir(dir).await?;
    let mut removed = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }

    if removed > 0 {
        log::info!("Removed {} stale files from {}", removed, dir.display());
    }
    Ok(())
}
