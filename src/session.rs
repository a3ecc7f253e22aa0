use std::collections::HashMap;

use teloxide::types::UserId;
use tokio::sync::Mutex;

use crate::settings::SettingKey;

/// What the next text message from an admin means.
/// No entry in [`Sessions`] means the message is handled normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSession {
    AwaitingSettingValue { key: SettingKey },
    AwaitingBroadcastText,
}

/// In-memory admin sessions keyed by user. Lost on restart.
#[derive(Default)]
pub struct Sessions {
    inner: Mutex<HashMap<UserId, AdminSession>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or replace) the user's pending session
    pub async fn begin(&self, user_id: UserId, session: AdminSession) {
        self.inner.lock().await.insert(user_id, session);
    }

    /// Remove and return the pending session; the user is back to normal afterwards
    pub async fn take(&self, user_id: UserId) -> Option<AdminSession> {
        self.inner.lock().await.remove(&user_id)
    }

    #[cfg(test)]
    pub async fn get(&self, user_id: UserId) -> Option<AdminSession> {
        self.inner.lock().await.get(&user_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_resets_to_none() {
        let sessions = Sessions::new();
        let admin = UserId(1);

        sessions.begin(admin, AdminSession::AwaitingBroadcastText).await;
        assert_eq!(sessions.get(admin).await, Some(AdminSession::AwaitingBroadcastText));

        assert_eq!(sessions.take(admin).await, Some(AdminSession::AwaitingBroadcastText));
        assert_eq!(sessions.take(admin).await, None);
    }

    #[tokio::test]
    async fn sessions_are_per_user() {
        let sessions = Sessions::new();
        sessions
            .begin(
                UserId(1),
                AdminSession::AwaitingSettingValue {
                    key: SettingKey::ChannelId,
                },
            )
            .await;

        assert_eq!(sessions.get(UserId(2)).await, None);
        sessions.begin(UserId(1), AdminSession::AwaitingBroadcastText).await;
        assert_eq!(
            sessions.take(UserId(1)).await,
            Some(AdminSession::AwaitingBroadcastText)
        );
    }
}
