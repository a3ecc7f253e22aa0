use std::{future::Future, path::PathBuf};

use teloxide::{
    prelude::*,
    types::{InputFile, MessageId},
};

use crate::{
    db::{NewDownload, Store},
    errors::{BotResult, HandlerResult},
    state::AppState,
    utils::{edit_html, send_html},
    video::{MediaFetcher, ensure_uploadable},
};

const CAPTION: &str = "Didn't get bored waiting?\n\nEnjoy, bro 😎";

pub async fn link_received(
    bot: &Bot,
    chat_id: ChatId,
    user_id: UserId,
    url: &str,
    state: &AppState,
) -> HandlerResult {
    log::info!("Download requested by user {}: {}", user_id.0, url);

    let status_msg = send_html(bot, chat_id, "⏳ <i>Downloading...</i>", None).await?;

    let result = process_link(&state.fetcher, &state.store, user_id, url, |path| {
        send_fetched(bot, chat_id, status_msg.id, path)
    })
    .await;

    match result {
        Ok(()) => {
            log::info!("Video sent to user {}", user_id.0);
            if let Err(e) = bot.delete_message(chat_id, status_msg.id).await {
                log::warn!("Failed to delete status message: {}", e);
            }
        }
        Err(e) => {
            log::error!("Download failed for user {}: {}", user_id.0, e);
            let text = format!("❌ Error while downloading the video: {}", e.user_message());
            if bot
                .edit_message_text(chat_id, status_msg.id, &text)
                .await
                .is_err()
            {
                bot.send_message(chat_id, text).await?;
            }
        }
    }

    Ok(())
}

/// Fetch `url`, check the size and hand the file to `send`.
///
/// Every attempt is recorded, successful or not, with the size whenever the
/// file got that far. The scratch file never outlives the call.
pub async fn process_link<F, Fut>(
    fetcher: &MediaFetcher,
    store: &Store,
    user_id: UserId,
    url: &str,
    send: F,
) -> BotResult<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = BotResult<()>>,
{
    let title = fetcher.fetch_title(url).await;
    let mut file_size = None;
    let result = fetch_and_send(fetcher, url, &mut file_size, send).await;

    store
        .record_download(&NewDownload {
            user_id: user_id.0 as i64,
            video_url: url,
            video_title: title.as_deref(),
            file_size,
            success: result.is_ok(),
        })
        .await;

    result
}

async fn fetch_and_send<F, Fut>(
    fetcher: &MediaFetcher,
    url: &str,
    file_size: &mut Option<u64>,
    send: F,
) -> BotResult<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = BotResult<()>>,
{
    let media = fetcher.fetch(url).await?;

    let size = media.size().await?;
    *file_size = Some(size);
    ensure_uploadable(size)?;

    send(media.path().to_path_buf()).await?;

    media.cleanup().await;
    Ok(())
}

async fn send_fetched(
    bot: &Bot,
    chat_id: ChatId,
    status_id: MessageId,
    path: PathBuf,
) -> BotResult<()> {
    if let Err(e) = edit_html(bot, chat_id, status_id, "✅ <i>Done! Sending...</i>", None).await {
        log::warn!("Failed to update status message: {}", e);
    }

    bot.send_video(chat_id, InputFile::file(path))
        .caption(CAPTION)
        .supports_streaming(true)
        .width(1920)
        .height(1080)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        os::unix::fs::PermissionsExt,
        path::Path,
        sync::atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::{db::UserProfile, errors::BotError, video::youtube::MAX_UPLOAD_BYTES};

    const URL: &str = "https://youtu.be/abc123";

    /// Stand-in for yt-dlp: prints a title, or writes a sparse file of
    /// `size` bytes where `-o` points
    fn fake_downloader(dir: &Path, size: u64) -> String {
        let script = dir.join("fake-yt-dlp");
        std::fs::write(
            &script,
            format!(
                r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
if [ -z "$out" ]; then echo "Fake title"; exit 0; fi
file=$(echo "$out" | sed 's/%(ext)s/mp4/')
dd if=/dev/zero of="$file" bs=1 count=0 seek={} 2>/dev/null
"#,
                size
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().to_string()
    }

    async fn store_with_user(user_id: i64) -> Store {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store
            .upsert_user(&UserProfile {
                user_id,
                username: None,
                first_name: Some("Ann".to_string()),
                last_name: None,
                language_code: None,
                is_bot: false,
                is_premium: false,
            })
            .await;
        store
    }

    fn scratch_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn oversize_file_is_removed_and_recorded_as_failed() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let fetcher = MediaFetcher::new(
            fake_downloader(tools.path(), MAX_UPLOAD_BYTES + 1),
            scratch.path(),
        );
        let store = store_with_user(1).await;
        let sent = AtomicBool::new(false);

        let result = process_link(&fetcher, &store, UserId(1), URL, |_| async {
            sent.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(BotError::FileTooLarge(_))));
        assert!(!sent.load(Ordering::SeqCst));
        assert_eq!(scratch_entries(scratch.path()), 0);

        let user = store.user_with_history(1).await.unwrap();
        assert_eq!(user.user.total_downloads, 1);
        assert_eq!(user.downloads.len(), 1);
        assert!(!user.downloads[0].success);
        assert_eq!(user.downloads[0].file_size, Some(52_428_801));
        assert_eq!(user.downloads[0].video_title.as_deref(), Some("Fake title"));
    }

    #[tokio::test]
    async fn failed_send_still_cleans_up() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let fetcher = MediaFetcher::new(fake_downloader(tools.path(), 1024), scratch.path());
        let store = store_with_user(2).await;

        let result = process_link(&fetcher, &store, UserId(2), URL, |path| async move {
            assert!(path.exists());
            Err(BotError::general("Request Entity Too Large"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(scratch_entries(scratch.path()), 0);

        let user = store.user_with_history(2).await.unwrap();
        assert!(!user.downloads[0].success);
        assert_eq!(user.downloads[0].file_size, Some(1024));
    }

    #[tokio::test]
    async fn delivered_video_is_recorded_and_removed() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let fetcher =
            MediaFetcher::new(fake_downloader(tools.path(), MAX_UPLOAD_BYTES), scratch.path());
        let store = store_with_user(3).await;

        process_link(&fetcher, &store, UserId(3), URL, |_| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(scratch_entries(scratch.path()), 0);
        let user = store.user_with_history(3).await.unwrap();
        assert!(user.downloads[0].success);
        assert_eq!(user.downloads[0].file_size, Some(MAX_UPLOAD_BYTES as i64));
    }

    #[tokio::test]
    async fn failed_fetch_is_recorded_without_size() {
        let scratch = tempfile::tempdir().unwrap();
        let fetcher = MediaFetcher::new("false", scratch.path());
        let store = store_with_user(4).await;

        let result = process_link(&fetcher, &store, UserId(4), URL, |_| async { Ok(()) }).await;

        assert!(matches!(result, Err(BotError::DownloadFailed(_))));
        let user = store.user_with_history(4).await.unwrap();
        assert_eq!(user.downloads[0].file_size, None);
        assert_eq!(user.downloads[0].video_title, None);
    }
}
