use std::sync::Arc;

use teloxide::{prelude::*, types::User};

use super::{
    ADMIN_MENU, MAIN_MENU, admin, link_received::link_received, remember_sender,
    send_subscription_prompt,
};
use crate::{
    errors::HandlerResult,
    keyboards,
    session::AdminSession,
    settings::RequiredChannel,
    state::AppState,
    subscription::{MembershipProbe, unsubscribed_channels},
    utils::{is_video_link, send_html},
};

/// Typing this opens the admin panel for allow-listed users
pub const ADMIN_PASSPHRASE: &str = "panda";

#[derive(Debug, PartialEq, Eq)]
pub enum TextRoute<'a> {
    AdminMenu,
    VideoLink(&'a str),
    Prompt,
}

pub fn route_text(text: &str, is_admin: bool) -> TextRoute<'_> {
    let text = text.trim();
    if is_admin && text == ADMIN_PASSPHRASE {
        TextRoute::AdminMenu
    } else if is_video_link(text) {
        TextRoute::VideoLink(text)
    } else {
        TextRoute::Prompt
    }
}

/// What a text message turns into once the sender is recorded and gated
#[derive(Debug, PartialEq)]
pub enum TextPlan<'a> {
    Subscribe(Vec<RequiredChannel>),
    AdminMenu,
    Session(AdminSession),
    Download(&'a str),
    Prompt,
}

pub async fn plan_text<'a, P: MembershipProbe>(
    probe: &P,
    state: &AppState,
    user: &User,
    text: &'a str,
) -> TextPlan<'a> {
    remember_sender(&state.store, user).await;

    let channels = state.settings.required_channels().await;
    let missing = unsubscribed_channels(probe, &channels, user.id).await;
    if !missing.is_empty() {
        return TextPlan::Subscribe(missing);
    }

    let is_admin = state.config.is_admin(user.id);
    let route = route_text(text, is_admin);
    if route == TextRoute::AdminMenu {
        return TextPlan::AdminMenu;
    }

    if is_admin {
        if let Some(session) = state.sessions.take(user.id).await {
            return TextPlan::Session(session);
        }
    }

    match route {
        TextRoute::VideoLink(url) => TextPlan::Download(url),
        _ => TextPlan::Prompt,
    }
}

pub async fn text_received(
    bot: Bot,
    msg: Message,
    text: String,
    state: Arc<AppState>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    match plan_text(&bot, &state, user, &text).await {
        TextPlan::Subscribe(missing) => send_subscription_prompt(&bot, chat_id, &missing).await,
        TextPlan::AdminMenu => {
            send_html(&bot, chat_id, ADMIN_MENU, Some(keyboards::admin_menu())).await?;
            Ok(())
        }
        TextPlan::Session(session) => {
            admin::session_reply(&bot, chat_id, session, &text, &state).await
        }
        TextPlan::Download(url) => link_received(&bot, chat_id, user.id, url, &state).await,
        TextPlan::Prompt => {
            send_html(&bot, chat_id, MAIN_MENU, Some(keyboards::main_menu())).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use teloxide::types::ChatMemberStatus;

    use super::*;
    use crate::{
        config::Config, db::Store, errors::BotError, session::Sessions, settings::SettingsStore,
        video::MediaFetcher,
    };

    const ADMIN: u64 = 100;
    const LINK: &str = "https://youtu.be/abc123";

    /// Same membership status in every channel
    struct Everywhere(ChatMemberStatus);

    #[async_trait]
    impl MembershipProbe for Everywhere {
        async fn member_status(
            &self,
            _channel_id: &str,
            _user_id: UserId,
        ) -> Result<ChatMemberStatus, BotError> {
            Ok(self.0.clone())
        }
    }

    async fn state(dir: &std::path::Path) -> AppState {
        let config = Config::from_lookup(|key| match key {
            "ADMIN_IDS" => Some(ADMIN.to_string()),
            _ => None,
        })
        .unwrap();

        AppState {
            config,
            store: Store::connect("sqlite::memory:").await.unwrap(),
            fetcher: MediaFetcher::new("false", dir.join("downloads")),
            settings: SettingsStore::load(dir.join("settings.json")).await.unwrap(),
            sessions: Sessions::new(),
        }
    }

    fn user(id: u64) -> User {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "is_bot": false,
            "first_name": "Ann",
        }))
        .unwrap()
    }

    #[test]
    fn passphrase_opens_panel_for_admins_only() {
        assert_eq!(route_text("panda", true), TextRoute::AdminMenu);
        assert_eq!(route_text(" panda\n", true), TextRoute::AdminMenu);
        assert_eq!(route_text("panda", false), TextRoute::Prompt);
        assert_eq!(route_text("Panda", true), TextRoute::Prompt);
    }

    #[test]
    fn video_links_go_to_download() {
        assert_eq!(
            route_text(" https://youtu.be/abc123 ", false),
            TextRoute::VideoLink("https://youtu.be/abc123")
        );
        assert_eq!(
            route_text("https://www.youtube.com/watch?v=abc", true),
            TextRoute::VideoLink("https://www.youtube.com/watch?v=abc")
        );
    }

    #[test]
    fn anything_else_gets_the_prompt() {
        assert_eq!(route_text("hello", false), TextRoute::Prompt);
        assert_eq!(route_text("https://vimeo.com/1", true), TextRoute::Prompt);
    }

    #[tokio::test]
    async fn unsubscribed_link_is_stopped_at_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let left = Everywhere(ChatMemberStatus::Left);
        let plan = plan_text(&left, &state, &user(5), LINK).await;

        let TextPlan::Subscribe(missing) = plan else {
            panic!("gated user got {:?}", plan);
        };
        assert_eq!(missing.len(), 3);

        // recorded as a user, but nothing was downloaded
        let record = state.store.user_with_history(5).await.unwrap();
        assert!(record.user.last_interaction >= record.user.first_interaction);
        assert_eq!(record.user.total_downloads, 0);
        assert!(record.downloads.is_empty());
        assert!(!dir.path().join("downloads").exists());
    }

    #[tokio::test]
    async fn gate_applies_to_admins_too() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        state
            .sessions
            .begin(UserId(ADMIN), AdminSession::AwaitingBroadcastText)
            .await;

        let banned = Everywhere(ChatMemberStatus::Banned);
        let plan = plan_text(&banned, &state, &user(ADMIN), "hi").await;

        assert!(matches!(plan, TextPlan::Subscribe(_)));
        assert_eq!(
            state.sessions.get(UserId(ADMIN)).await,
            Some(AdminSession::AwaitingBroadcastText)
        );
    }

    #[tokio::test]
    async fn subscribed_user_reaches_features() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let member = Everywhere(ChatMemberStatus::Member);

        assert_eq!(
            plan_text(&member, &state, &user(5), LINK).await,
            TextPlan::Download(LINK)
        );
        assert_eq!(
            plan_text(&member, &state, &user(5), "panda").await,
            TextPlan::Prompt
        );
    }

    #[tokio::test]
    async fn passphrase_keeps_pending_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let member = Everywhere(ChatMemberStatus::Administrator);
        state
            .sessions
            .begin(UserId(ADMIN), AdminSession::AwaitingBroadcastText)
            .await;

        assert_eq!(
            plan_text(&member, &state, &user(ADMIN), "panda").await,
            TextPlan::AdminMenu
        );
        assert_eq!(
            plan_text(&member, &state, &user(ADMIN), "hello all").await,
            TextPlan::Session(AdminSession::AwaitingBroadcastText)
        );
        assert_eq!(
            plan_text(&member, &state, &user(ADMIN), LINK).await,
            TextPlan::Download(LINK)
        );
    }
}
