use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::errors::{BotError, BotResult};

const CHECK_SUBSCRIPTION: &str = "check_subscription";
const MENU: &str = "menu";
const INFORMATION: &str = "information";

/// Every callback token the bot puts on its buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    CheckSubscription,
    Menu,
    Information,
    Admin(AdminAction),
}

/// Admin panel buttons, only honoured for allow-listed users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum AdminAction {
    #[strum(serialize = "base_export_json")]
    ExportJson,
    #[strum(serialize = "base_export_sql")]
    ExportSql,
    #[strum(serialize = "base_settings")]
    ExportSettings,
    #[strum(serialize = "bot_statistics")]
    Statistics,
    #[strum(serialize = "change_channel_id")]
    ChangeChannelId,
    #[strum(serialize = "change_channel_url")]
    ChangeChannelUrl,
    #[strum(serialize = "sendall")]
    Broadcast,
}

impl CallbackAction {
    pub fn parse(data: &str) -> BotResult<Self> {
        match data {
            CHECK_SUBSCRIPTION => Ok(Self::CheckSubscription),
            MENU => Ok(Self::Menu),
            INFORMATION => Ok(Self::Information),
            other => AdminAction::from_str(other)
                .map(Self::Admin)
                .map_err(|_| BotError::unknown_callback(data)),
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::CheckSubscription => CHECK_SUBSCRIPTION,
            Self::Menu => MENU,
            Self::Information => INFORMATION,
            Self::Admin(action) => action.into(),
        }
    }
}
