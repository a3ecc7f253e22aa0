//! Inline keyboards. Pure functions, the only inputs are configured URLs.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::{
    callbacks::{AdminAction, CallbackAction},
    settings::RequiredChannel,
};

fn callback(label: &str, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, action.token())
}

/// URL button, or nothing if the configured link isn't a valid URL
fn link(label: &str, url: &str) -> Option<InlineKeyboardButton> {
    match Url::parse(url.trim()) {
        Ok(url) => Some(InlineKeyboardButton::url(label, url)),
        Err(e) => {
            log::warn!("Skipping button {:?}: invalid url {:?} ({})", label, url, e);
            None
        }
    }
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[callback("ℹ️ Information", CallbackAction::Information)]])
}

pub fn information(owner_url: Option<&str>, product_url: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(button) = owner_url.and_then(|url| link("🤵 Owner", url)) {
        rows.push(vec![button]);
    }
    if let Some(button) = product_url.and_then(|url| link("🤖 Our flagship product 🤖", url)) {
        rows.push(vec![button]);
    }
    rows.push(vec![callback("🏠 Main menu", CallbackAction::Menu)]);
    InlineKeyboardMarkup::new(rows)
}

/// One button per channel still to join, then the re-check button
pub fn subscription_prompt(channels: &[RequiredChannel]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .filter_map(|ch| link(&format!("📢 {}", ch.name), &ch.url))
        .map(|button| vec![button])
        .collect();
    rows.push(vec![callback(
        "✅ Check subscription",
        CallbackAction::CheckSubscription,
    )]);
    InlineKeyboardMarkup::new(rows)
}

fn admin(label: &str, action: AdminAction) -> InlineKeyboardButton {
    callback(label, CallbackAction::Admin(action))
}

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![
            admin("📊 Export JSON", AdminAction::ExportJson),
            admin("🗄️ Export SQL", AdminAction::ExportSql),
        ],
        vec![
            admin("📈 Statistics", AdminAction::Statistics),
            admin("⚙️ Settings", AdminAction::ExportSettings),
        ],
        vec![
            admin("🔧 CHANNEL_ID", AdminAction::ChangeChannelId),
            admin("🔨 CHANNEL_URL", AdminAction::ChangeChannelUrl),
        ],
        vec![admin("🔊 Broadcast", AdminAction::Broadcast)],
        vec![callback("🔝 Main menu 🔝", CallbackAction::Menu)],
    ])
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;

    fn callbacks_of(markup: &InlineKeyboardMarkup) -> Vec<CallbackAction> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => {
                    Some(CallbackAction::parse(data).unwrap())
                }
                _ => None,
            })
            .collect()
    }

    fn urls_of(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::Url(url) => Some(url.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn admin_menu_offers_every_admin_action() {
        let offered = callbacks_of(&admin_menu());
        for action in AdminAction::iter() {
            assert!(
                offered.contains(&CallbackAction::Admin(action)),
                "{} missing",
                action
            );
        }
        assert!(offered.contains(&CallbackAction::Menu));
    }

    #[test]
    fn prompt_lists_channels_then_recheck() {
        let channels = vec![
            RequiredChannel {
                id: "-1".into(),
                name: "One".into(),
                url: "https://t.me/+one".into(),
            },
            RequiredChannel {
                id: "-2".into(),
                name: "Two".into(),
                url: "not a url".into(),
            },
        ];

        let markup = subscription_prompt(&channels);
        assert_eq!(urls_of(&markup), vec!["https://t.me/+one".to_string()]);
        assert_eq!(callbacks_of(&markup), vec![CallbackAction::CheckSubscription]);
    }

    #[test]
    fn information_skips_missing_links() {
        let markup = information(None, Some("https://t.me/product_bot"));
        assert_eq!(urls_of(&markup), vec!["https://t.me/product_bot".to_string()]);
        assert_eq!(callbacks_of(&markup), vec![CallbackAction::Menu]);
    }

    #[test]
    fn main_menu_points_to_information() {
        assert_eq!(callbacks_of(&main_menu()), vec![CallbackAction::Information]);
    }
}
